use crate::{Mode, SubscribeArgs};
use anyhow::Result;
use tcs_client::{ChatMessage, Raw, Structured, SubscriberOptions, Subscription, TargetSource};
use tokio_util::sync::CancellationToken;

pub async fn subscribe(args: SubscribeArgs) -> Result<()> {
    let options = options_from_args(&args)?;
    tracing::info!(
        target_source = ?options.target,
        filter_pattern = %options.filter_pattern,
        listen_addr = %options.listen_addr,
        callback_path = %options.callback_path,
        callback_url = ?options.callback_url,
        mode = ?args.mode,
        "subscriber configuration loaded"
    );

    let subscription = match args.mode {
        Mode::Raw => Subscription::start::<Raw>(options, print_raw).await?,
        Mode::Structured => {
            Subscription::start::<Structured>(options, print_chat_message).await?
        }
    };
    tracing::info!(
        status = %subscription.status_line(),
        local_addr = %subscription.local_addr(),
        callback_url = %subscription.callback_url(),
        "subscribed; waiting for deliveries"
    );

    let shutdown = subscription.shutdown_token();
    tokio::spawn(shutdown_signal(shutdown));
    subscription.wait().await?;
    tracing::info!("subscriber stopped");
    Ok(())
}

fn options_from_args(args: &SubscribeArgs) -> Result<SubscriberOptions> {
    let target = match (&args.config, &args.target_url) {
        (Some(path), _) => TargetSource::ConfigFile(path.clone()),
        (None, Some(url)) => TargetSource::Url(url.trim().to_string()),
        (None, None) => {
            return Err(anyhow::anyhow!(
                "either --target-url or --config is required"
            ));
        }
    };
    Ok(SubscriberOptions::new(target, args.filter.clone())
        .with_listen_addr(args.listen)
        .with_callback_path(args.callback_path.clone())
        .with_callback_url(args.callback_url.clone()))
}

fn print_raw(body: String) -> String {
    println!("{body}");
    "received".to_string()
}

fn print_chat_message(msg: ChatMessage) -> String {
    match serde_json::to_string(&msg) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(%e, "chat message could not be re-encoded"),
    }
    format!("received message from {}", msg.user)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("received ctrl-c; stopping callback listener"),
        _ = terminate => tracing::warn!("received SIGTERM; stopping callback listener"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
