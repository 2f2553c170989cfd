use alloy::{
    primitives::utils::format_ether,
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
};
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use lottery_client::{
    LotteryClient,
    SyncState,
    SyncView,
    bindings::ContractBinding,
    config::{
        Cli,
        Command,
        expand_path,
    },
    evm::EvmTransport,
    network::watch_network,
    notification::{
        NotificationEvent,
        NotificationKind,
    },
    submitter::TransactionStatus,
    types::Amount,
    wallets::{
        KeystoreDescriptor,
        unlock_keystore,
    },
};
use std::{
    path::Path,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::broadcast::error::RecvError,
    time,
};
use tracing::{
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const FIRST_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, "lottery-client.log"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

fn connect(cli: &Cli) -> Result<DynProvider> {
    let Some(raw) = cli.keystore.as_deref() else {
        return Ok(ProviderBuilder::new()
            .connect_http(cli.rpc_url.clone())
            .erased());
    };
    let descriptor = KeystoreDescriptor::from_path(raw)?;
    let signer = unlock_keystore(&descriptor)?;
    info!(account = %signer.address(), keystore = %descriptor.name, "keystore unlocked");
    Ok(ProviderBuilder::new()
        .wallet(signer)
        .connect_http(cli.rpc_url.clone())
        .erased())
}

fn print_view(view: &SyncView) {
    match view.state {
        SyncState::Unresolved if view.needs_network_switch() => {
            if let Some(network) = view.network {
                println!("Please switch network: no lottery on chain {network}");
            }
        }
        SyncState::Unresolved => println!("Waiting for a network connection"),
        SyncState::Syncing => println!("Syncing lottery state..."),
        SyncState::Synced | SyncState::SyncFailed => {
            let snapshot = &view.snapshot;
            let winner = snapshot
                .recent_winner
                .map(|winner| winner.to_string())
                .unwrap_or_else(|| "none yet".to_string());
            println!(
                "Entrance fee: {} ETH | Players: {} | Recent winner: {}{}",
                format_ether(snapshot.entrance_fee),
                snapshot.player_count,
                winner,
                if view.is_busy() { " | entry pending" } else { "" },
            );
            if let Some(err) = &view.last_read_error {
                println!("Last refresh failed: {err}");
            }
        }
    }
}

fn print_notification(event: &NotificationEvent) {
    match event.kind {
        NotificationKind::Info => println!("[info] {}", event.message),
        NotificationKind::Error => eprintln!("[error] {}", event.message),
    }
}

async fn watch(client: &LotteryClient) -> Result<()> {
    let mut views = client.subscribe_snapshot();
    let mut notifications = client.subscribe_notifications();
    print_view(&views.borrow_and_update());
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                print_view(&views.borrow_and_update());
            }
            event = notifications.recv() => {
                match event {
                    Ok(event) => print_notification(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dropped notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, exiting");
                break;
            }
        }
    }
    Ok(())
}

async fn enter(client: &LotteryClient, amount: Option<Amount>) -> Result<()> {
    let view = time::timeout(
        FIRST_SYNC_TIMEOUT,
        client.wait_for(|view| {
            matches!(view.state, SyncState::Synced | SyncState::SyncFailed)
                || view.needs_network_switch()
        }),
    )
    .await
    .wrap_err("Timed out waiting for the first lottery sync")??;
    if view.needs_network_switch() {
        return Err(eyre!(
            "No lottery contract on the connected network; switch network and retry"
        ));
    }
    if let Some(err) = &view.last_read_error {
        return Err(eyre!("Could not read the lottery state: {err}"));
    }

    let amount = amount.unwrap_or(view.snapshot.entrance_fee);
    let mut pending = client.submit_entry(amount).await?;
    println!(
        "Entry {} sent with {} ETH, waiting for {} confirmation(s)",
        pending.id(),
        format_ether(pending.submitted_amount()),
        pending.confirmations_required(),
    );
    match pending.outcome().await? {
        TransactionStatus::Confirmed => {
            let refreshed = client
                .wait_for(|view| view.state != SyncState::Syncing && !view.is_busy())
                .await?;
            println!("Transaction Complete!");
            print_view(&refreshed);
            Ok(())
        }
        TransactionStatus::Failed(reason) => Err(eyre!("Transaction failed: {reason}")),
        TransactionStatus::Submitted => Err(eyre!("Entry {} never resolved", pending.id())),
    }
}

async fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Command::Enter { .. }) && cli.keystore.is_none() {
        return Err(eyre!("Entering the lottery requires --keystore <path>"));
    }
    let bindings_path = expand_path(&cli.bindings);
    let binding = ContractBinding::load(&bindings_path).map_err(|e| eyre!(e))?;
    info!(networks = binding.len(), path = %bindings_path.display(), "contract bindings loaded");

    let provider = connect(&cli)?;
    let transport = Arc::new(EvmTransport::new(provider.clone()));
    let (client, engine) = LotteryClient::spawn(binding, Arc::clone(&transport), transport);
    let network_watcher = tokio::spawn(watch_network(
        client.clone(),
        cli.network_poll_interval(),
        move || {
            let provider = provider.clone();
            async move { provider.get_chain_id().await }
        },
    ));

    let result = match cli.command {
        Command::Watch => watch(&client).await,
        Command::Enter { amount } => enter(&client, amount).await,
    };

    network_watcher.abort();
    client.shutdown();
    engine.await.wrap_err("sync engine panicked")?;
    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli.log_dir);
    info!("starting lottery client");
    run(cli).await
}
