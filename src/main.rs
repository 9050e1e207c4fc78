use eyre::Result;
use std::sync::Arc;
use token_ledger::{
    create_fallback_provider, logger, AlloyCaller, BalanceCheck, Balances, Config,
    FallbackConfig, LogSink, LogWatcher, Runtime, TelegramNotifier, TokenListManager, Tokens,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let config_path = std::env::var("CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::from_file(&config_path)?;

    // Token lists come first, lookups need them once the network is up
    let registry = Arc::new(TokenListManager::new(config.tokens.default.clone()));
    registry.install_required(&config.tokens.required).await?;

    let provider = create_fallback_provider(FallbackConfig::new(
        config.rpc_nodes.clone(),
        config.active_transport_count,
    ))?;
    let mut caller = AlloyCaller::new(provider.clone());
    if let Some(multicall) = config.multicall {
        caller = caller.with_multicall(multicall);
    }
    let caller = Arc::new(caller);
    let tokens = Tokens::connect(registry, caller).await?;

    let balances = Arc::new(Balances::new(&tokens, &config.watch.tokens).await?);
    info!(config = %config_path, tokens = balances.len(), "{}", balances);

    let source = Arc::new(LogWatcher::new(provider, config.poll_interval));
    let mut runtime = Runtime::new(source).with_signer(config.signer);
    balances.monitor(&mut runtime, &config.watch.accounts)?;

    runtime.add_sink(Arc::new(LogSink::new()));

    if let Some(telegram) = &config.telegram {
        let notifier = TelegramNotifier::new(telegram);
        notifier.clone().spawn_command_handler();
        runtime.add_sink(Arc::new(notifier));
    }

    if let Some(debounce) = config.watch.check_debounce {
        runtime.add_sink(Arc::new(BalanceCheck::new(balances.clone(), debounce)));
    }

    runtime.run().await?;
    Ok(())
}
