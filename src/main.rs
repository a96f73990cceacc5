use call_session::sdk::{LoopbackOptions, LoopbackSdk, TelephonySdk};
use call_session::{utils, HttpTokenProvider, SessionConfig, SessionManager};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use tracing::{error, info};

/// Call Session CLI Application
///
/// 基于进程内模拟 SDK 的文本软电话
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Token service URL (e.g., http://127.0.0.1:8080/Client/Token)
    #[arg(long, env = "CALL_TOKEN_ENDPOINT", default_value = "http://127.0.0.1:8080/Client/Token")]
    token_endpoint: String,

    /// Use this token instead of fetching one
    #[arg(long, env = "CALL_TOKEN")]
    token: Option<String>,

    /// Caller identifier used for outbound calls
    #[arg(short, long, env = "CALL_SOURCE_ID", default_value = "+12152407664")]
    source_id: String,

    /// Answer incoming calls automatically
    #[arg(long)]
    auto_answer: bool,

    /// Log level
    #[arg(short, long, env = "CALL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

const HELP: &str = "\
commands:
  dial <target>                         place a call
  hangup | accept | reject              call control
  mute on|off                           mute the connected call
  listen on|off                         start/stop listening for calls
  sound incoming|outgoing|disconnect on|off
  status                                print device and call state
  sim incoming <from>                   simulate an incoming call
  sim answer | sim hangup               simulate the remote side
  sim error <code> <message>            simulate a failed connection
  quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    utils::initialize_logging(args.log_level.as_str());

    let config = SessionConfig::new(&args.token_endpoint, &args.source_id)?
        .with_auto_answer(args.auto_answer);

    let sdk = Arc::new(LoopbackSdk::new(LoopbackOptions {
        auto_register: true,
        ..Default::default()
    }));
    let manager = SessionManager::new(config, sdk.clone() as Arc<dyn TelephonySdk>);

    let observer = Arc::downgrade(&manager);
    manager.subscribe(move || {
        if let Some(manager) = observer.upgrade() {
            println!("[status] {}", manager.status_line());
        }
    });

    let started = match &args.token {
        Some(token) => manager.initialize(token).await,
        None => {
            let provider = HttpTokenProvider::new(manager.config().token_timeout)?;
            manager.start(&provider).await
        }
    };
    if let Err(e) = started {
        error!("设备注册失败: {}", e);
        error!("Error code: {}", e.error_code());
        return Err(format!("device registration failed: {}", e).into());
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&manager, &sdk, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down...");
    manager.shutdown().await;
    Ok(())
}

/// 执行一条命令，返回 false 表示退出
async fn run_command(manager: &SessionManager, sdk: &LoopbackSdk, line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();

    let result = match words.as_slice() {
        [] => Ok(()),
        ["quit"] | ["exit"] => return false,
        ["help"] => {
            println!("{}", HELP);
            Ok(())
        }
        ["status"] => {
            println!("{}", manager.status_line());
            Ok(())
        }
        ["dial", target @ ..] if !target.is_empty() => {
            manager.place_call(&target.join(" ")).await.map(|_| ())
        }
        ["hangup"] => manager.hang_up().await,
        ["accept"] => manager.accept_incoming().await,
        ["reject"] => manager.reject_incoming().await,
        ["mute", flag] => match parse_flag(flag) {
            Some(muted) => manager.set_muted(muted).await,
            None => usage(),
        },
        ["listen", flag] => match parse_flag(flag) {
            Some(true) => manager.start_listening().await,
            Some(false) => manager.stop_listening().await,
            None => usage(),
        },
        ["sound", which, flag] => match (*which, parse_flag(flag)) {
            ("incoming", Some(on)) => manager.set_incoming_sound_enabled(on).await,
            ("outgoing", Some(on)) => manager.set_outgoing_sound_enabled(on).await,
            ("disconnect", Some(on)) => manager.set_disconnect_sound_enabled(on).await,
            _ => usage(),
        },
        ["sim", "incoming", from] => {
            sdk.simulate_incoming(from);
            Ok(())
        }
        ["sim", "answer"] => {
            simulate_remote(manager, |handle| sdk.simulate_answer(handle));
            Ok(())
        }
        ["sim", "hangup"] => {
            simulate_remote(manager, |handle| sdk.simulate_hangup(handle));
            Ok(())
        }
        ["sim", "error", code, message @ ..] => match code.parse::<i32>() {
            Ok(code) => {
                let message = message.join(" ");
                simulate_remote(manager, |handle| sdk.simulate_error(handle, code, &message));
                Ok(())
            }
            Err(_) => usage(),
        },
        _ => usage(),
    };

    if let Err(e) = result {
        println!("error [{}]: {}", e.error_code(), e);
    }
    true
}

fn simulate_remote<F>(manager: &SessionManager, action: F)
where
    F: FnOnce(call_session::ConnectionHandle) -> bool,
{
    match manager.call_state() {
        Some(call) => {
            action(call.handle);
        }
        None => println!("no active call"),
    }
}

fn parse_flag(flag: &str) -> Option<bool> {
    match flag {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn usage() -> call_session::SessionResult<()> {
    println!("{}", HELP);
    Ok(())
}
