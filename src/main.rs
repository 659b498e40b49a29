use clap::Parser;
use musicsynq_lib::cli::Cli;
use musicsynq_lib::config::default_config_dir;
use musicsynq_lib::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let _ = std::fs::create_dir_all(&config_dir);

    // guard 活到 main 结束，保证日志写完
    let guard = init_logging(&config_dir, cli.verbose);
    tracing::debug!("配置目录: {:?}", config_dir);

    let code = match musicsynq_lib::commands::dispatch(cli.command, &config_dir).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}
