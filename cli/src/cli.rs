use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use land_wallet::prelude::*;
use tracing::{info, warn};

use crate::config::CliConfig;
use crate::terminal::TerminalSink;

/// Everything a command needs, wired from the configuration
struct Wallet {
    sessions: SessionManager,
    dispatcher: ActionDispatcher,
    notifier: Notifier,
}

impl Wallet {
    async fn open(config: &CliConfig) -> Result<Self> {
        let provider: ProviderHandle = Arc::new(
            RpcProvider::new(config.rpc())
                .with_context(|| format!("Failed to create provider for {}", config.rpc_url))?,
        );
        let contract = match config.abi_json()? {
            Some(json) => LandRegistryContract::from_json(config.contract_address, &json)?,
            None => LandRegistryContract::embedded(config.contract_address)?,
        };

        let notifier = Notifier::new(Arc::new(TerminalSink));
        let mut sessions = SessionManager::new(Some(provider.clone()), notifier.clone());
        if let Some(url) = &config.backend_url {
            let recorder = HttpAddressRecorder::new(url, config.request_timeout())?;
            sessions = sessions.with_recorder(Arc::new(recorder));
        }
        let dispatcher = ActionDispatcher::new(Some(provider), contract)
            .with_reset_signal(sessions.reset_signal());

        sessions.initialize().await?;
        Ok(Self {
            sessions,
            dispatcher,
            notifier,
        })
    }

    /// Uses the already authorized account, asking the provider only if there is none
    async fn ensure_connected(&mut self) -> Result<Session> {
        if !self.sessions.session().is_active() {
            self.sessions.connect().await?;
        }
        Ok(self.sessions.session())
    }

    fn finish(&self, action: &str, outcome: TransactionOutcome) -> Result<()> {
        self.notifier.report(action, &outcome);
        println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
        match outcome.error() {
            Some(err) => bail!("{action} failed: {}", err.message()),
            None => Ok(()),
        }
    }
}

/// Drives `action` while applying provider notifications, so a network switch
/// cancels it instead of sitting unread in the channel
async fn follow_events(
    sessions: &mut SessionManager,
    action: impl Future<Output = TransactionOutcome>,
) -> TransactionOutcome {
    tokio::pin!(action);
    loop {
        tokio::select! {
            biased;
            outcome = &mut action => return outcome,
            Some(event) = sessions.next_event() => {
                if let Err(e) = sessions.handle_event(event).await {
                    warn!("Failed to handle provider event: {e}");
                }
            }
        }
    }
}

fn land_id_arg() -> Arg {
    Arg::new("land-id")
        .value_name("LAND_ID")
        .help("Id of the land parcel")
        .required(true)
}

fn price_arg() -> Arg {
    Arg::new("price")
        .long("price")
        .value_name("ETHER")
        .help("Price in ether, e.g. 1.5")
        .required(true)
}

fn land_fields(command: Command) -> Command {
    command
        .arg(
            Arg::new("title")
                .long("title")
                .value_name("TITLE")
                .required(true),
        )
        .arg(
            Arg::new("location")
                .long("location")
                .value_name("LOCATION")
                .required(true),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .value_name("TEXT")
                .default_value(""),
        )
        .arg(price_arg())
        .arg(
            Arg::new("for-sale")
                .long("for-sale")
                .help("List the parcel for sale")
                .action(ArgAction::SetTrue),
        )
}

fn string_arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument: {name}"))
}

fn land_id(matches: &ArgMatches) -> Result<U256> {
    let raw = string_arg(matches, "land-id")?;
    raw.parse::<U256>()
        .with_context(|| format!("Invalid land id: {raw}"))
}

fn land_input(matches: &ArgMatches) -> Result<LandInput> {
    Ok(LandInput {
        title: string_arg(matches, "title")?.to_string(),
        location: string_arg(matches, "location")?.to_string(),
        description: string_arg(matches, "description")?.to_string(),
        price: string_arg(matches, "price")?.to_string(),
        for_sale: matches.get_flag("for-sale"),
    })
}

fn land_json(record: &LandRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id.to_string(),
        "owner": record.owner.to_string(),
        "title": record.title,
        "location": record.location,
        "description": record.description,
        "price": record.price_display(),
        "forSale": record.for_sale,
        "registrationDate": record.registration_date.to_string(),
        "exists": record.exists(),
    })
}

/// Land registry wallet cli
pub struct Cli;

impl Cli {
    pub fn command() -> Command {
        Command::new("land-cli")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Registers, updates and trades land parcels through a wallet provider")
            .subcommand_required(true)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("TOML configuration file")
                    .value_parser(clap::value_parser!(PathBuf))
                    .global(true),
            )
            .arg(
                Arg::new("rpc-url")
                    .long("rpc-url")
                    .value_name("URL")
                    .help("JSON-RPC endpoint, overrides the config file")
                    .global(true),
            )
            .arg(
                Arg::new("contract")
                    .long("contract")
                    .value_name("ADDRESS")
                    .help("Land registry contract address, overrides the config file")
                    .global(true),
            )
            .arg(
                Arg::new("abi")
                    .long("abi")
                    .value_name("FILE")
                    .help("Contract ABI file, overrides the embedded ABI")
                    .value_parser(clap::value_parser!(PathBuf))
                    .global(true),
            )
            .arg(
                Arg::new("backend-url")
                    .long("backend-url")
                    .value_name("URL")
                    .help("Service notified of connected wallet addresses")
                    .global(true),
            )
            .subcommand(Command::new("status").about("Show the authorized account"))
            .subcommand(Command::new("connect").about("Request account access from the provider"))
            .subcommand(land_fields(
                Command::new("register").about("Register a new land parcel"),
            ))
            .subcommand(land_fields(
                Command::new("update")
                    .about("Update an owned land parcel")
                    .arg(land_id_arg()),
            ))
            .subcommand(
                Command::new("buy")
                    .about("Buy a parcel that is for sale, paying its price")
                    .arg(land_id_arg())
                    .arg(price_arg()),
            )
            .subcommand(
                Command::new("change-price")
                    .about("Change the asking price of an owned parcel")
                    .arg(land_id_arg())
                    .arg(price_arg()),
            )
            .subcommand(
                Command::new("toggle-sale")
                    .about("List or unlist an owned parcel")
                    .arg(land_id_arg())
                    .arg(
                        Arg::new("for-sale")
                            .value_name("FOR_SALE")
                            .value_parser(clap::value_parser!(bool))
                            .required(true),
                    ),
            )
            .subcommand(
                Command::new("land")
                    .about("Show a land parcel")
                    .arg(land_id_arg()),
            )
            .subcommand(
                Command::new("lands-by-owner")
                    .about("List the parcel ids held by an owner")
                    .arg(
                        Arg::new("owner")
                            .value_name("ADDRESS")
                            .help("Owner address, defaults to the connected account"),
                    ),
            )
            .subcommand(
                Command::new("transaction-count").about("Number of recorded land transfers"),
            )
            .subcommand(
                Command::new("watch")
                    .about("Follow account and network changes until interrupted"),
            )
    }

    /// Applies command line overrides on top of the config file
    pub fn config(matches: &ArgMatches) -> Result<CliConfig> {
        let mut config = CliConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
        if let Some(url) = matches.get_one::<String>("rpc-url") {
            config.rpc_url = url.clone();
        }
        if let Some(address) = matches.get_one::<String>("contract") {
            config.contract_address = address
                .parse::<Address>()
                .with_context(|| format!("Invalid contract address: {address}"))?;
        }
        if let Some(path) = matches.get_one::<PathBuf>("abi") {
            config.abi_path = Some(path.clone());
        }
        if let Some(url) = matches.get_one::<String>("backend-url") {
            config.backend_url = Some(url.clone());
        }
        Ok(config)
    }

    pub async fn execute(matches: ArgMatches) -> Result<()> {
        let config = Self::config(&matches)?;
        info!("Using {} with contract {}", config.rpc_url, config.contract_address);
        let mut wallet = Wallet::open(&config).await?;

        let result = Self::run_command(&mut wallet, &matches).await;
        // The runtime is dropped on return, taking unsent notifications with it
        wallet.sessions.flush().await;
        result
    }

    async fn run_command(wallet: &mut Wallet, matches: &ArgMatches) -> Result<()> {
        match matches.subcommand() {
            Some(("status", _)) => {
                let account = wallet.sessions.session().account();
                println!(
                    "{}",
                    serde_json::json!({
                        "connected": account.is_some(),
                        "address": account.map(|a| a.to_string()),
                    })
                );
                Ok(())
            }
            Some(("connect", _)) => {
                let account = wallet.sessions.connect().await?;
                println!("{account}");
                Ok(())
            }
            Some(("register", sub)) => {
                let input = land_input(sub)?;
                let session = wallet.ensure_connected().await?;
                let outcome = follow_events(
                    &mut wallet.sessions,
                    wallet.dispatcher.register_land(&session, &input),
                )
                .await;
                if let Some(id) = outcome.registered_land_id() {
                    info!("Registered land {id}");
                }
                wallet.finish("Register land", outcome)
            }
            Some(("update", sub)) => {
                let (id, input) = (land_id(sub)?, land_input(sub)?);
                let session = wallet.ensure_connected().await?;
                let outcome = follow_events(
                    &mut wallet.sessions,
                    wallet.dispatcher.update_land(&session, id, &input),
                )
                .await;
                wallet.finish("Update land", outcome)
            }
            Some(("buy", sub)) => {
                let id = land_id(sub)?;
                let session = wallet.ensure_connected().await?;
                let price = string_arg(sub, "price")?;
                let outcome = follow_events(
                    &mut wallet.sessions,
                    wallet.dispatcher.buy_land(&session, id, price),
                )
                .await;
                wallet.finish("Buy land", outcome)
            }
            Some(("change-price", sub)) => {
                let id = land_id(sub)?;
                let session = wallet.ensure_connected().await?;
                let price = string_arg(sub, "price")?;
                let outcome = follow_events(
                    &mut wallet.sessions,
                    wallet.dispatcher.change_land_price(&session, id, price),
                )
                .await;
                wallet.finish("Change land price", outcome)
            }
            Some(("toggle-sale", sub)) => {
                let id = land_id(sub)?;
                let for_sale = sub
                    .get_one::<bool>("for-sale")
                    .copied()
                    .context("Missing argument: for-sale")?;
                let session = wallet.ensure_connected().await?;
                let outcome = follow_events(
                    &mut wallet.sessions,
                    wallet.dispatcher.toggle_for_sale(&session, id, for_sale),
                )
                .await;
                wallet.finish("Toggle for sale", outcome)
            }
            Some(("land", sub)) => {
                let record = wallet.dispatcher.land(land_id(sub)?).await?;
                println!("{}", serde_json::to_string_pretty(&land_json(&record))?);
                Ok(())
            }
            Some(("lands-by-owner", sub)) => {
                let owner = match sub.get_one::<String>("owner") {
                    Some(raw) => raw
                        .parse::<Address>()
                        .with_context(|| format!("Invalid owner address: {raw}"))?,
                    None => wallet
                        .sessions
                        .session()
                        .account()
                        .context("No owner given and no wallet connected")?,
                };
                let ids: Vec<String> = wallet
                    .dispatcher
                    .lands_by_owner(owner)
                    .await?
                    .iter()
                    .map(U256::to_string)
                    .collect();
                println!("{}", serde_json::to_string_pretty(&ids)?);
                Ok(())
            }
            Some(("transaction-count", _)) => {
                println!("{}", wallet.dispatcher.transaction_count().await?);
                Ok(())
            }
            Some(("watch", _)) => {
                tokio::select! {
                    _ = wallet.sessions.run() => info!("Provider closed its event channel"),
                    result = tokio::signal::ctrl_c() => {
                        result.context("Failed to listen for interrupt")?;
                        info!("Interrupted");
                    }
                }
                Ok(())
            }
            Some((name, _)) => bail!("Unknown command: {name}"),
            None => bail!("No command given"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> ArgMatches {
        Cli::command()
            .try_get_matches_from(std::iter::once("land-cli").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let matches = parse(&[
            "--rpc-url",
            "http://localhost:7545",
            "--contract",
            "0x1111111111111111111111111111111111111111",
            "--backend-url",
            "http://localhost:3000",
            "status",
        ]);
        let config = Cli::config(&matches).unwrap();

        assert_eq!(config.rpc_url, "http://localhost:7545");
        assert_eq!(config.contract_address, Address::repeat_byte(0x11));
        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_contract_flag() {
        let matches = parse(&["--contract", "0x1234", "status"]);
        assert!(Cli::config(&matches).is_err());
    }

    #[test]
    fn test_register_arguments() {
        let matches = parse(&[
            "register",
            "--title",
            "Plot 7",
            "--location",
            "Eldoret",
            "--price",
            "2.25",
            "--for-sale",
        ]);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "register");
        assert_eq!(
            land_input(sub).unwrap(),
            LandInput {
                title: "Plot 7".to_string(),
                location: "Eldoret".to_string(),
                description: String::new(),
                price: "2.25".to_string(),
                for_sale: true,
            }
        );
    }

    #[test]
    fn test_toggle_sale_and_land_id() {
        let matches = parse(&["toggle-sale", "42", "false"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(land_id(sub).unwrap(), U256::from(42u64));
        assert_eq!(sub.get_one::<bool>("for-sale"), Some(&false));

        let matches = parse(&["land", "forty-two"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert!(land_id(sub).is_err());
    }

    #[test]
    fn test_land_json() {
        let record = LandRecord {
            id: U256::from(2u64),
            owner: Address::repeat_byte(0x22),
            title: "Hill".to_string(),
            location: "Nyeri".to_string(),
            description: String::new(),
            price: U256::from(1_500_000_000_000_000_000u64),
            for_sale: true,
            registration_date: U256::from(1_700_000_000u64),
        };
        let json = land_json(&record);
        assert_eq!(json["price"], "1.5");
        assert_eq!(json["forSale"], true);
        assert_eq!(json["exists"], true);
    }

    fn wallet_parts(
        provider: &Arc<land_wallet::test_utils::MockProvider>,
    ) -> (SessionManager, ActionDispatcher) {
        use land_wallet::test_utils::{RecordingSink, TEST_CONTRACT};

        let handle: ProviderHandle = provider.clone();
        let sessions = SessionManager::new(
            Some(handle.clone()),
            Notifier::new(Arc::new(RecordingSink::default())),
        );
        let dispatcher =
            ActionDispatcher::new(Some(handle), LandRegistryContract::embedded(TEST_CONTRACT).unwrap())
                .with_reset_signal(sessions.reset_signal());
        (sessions, dispatcher)
    }

    #[tokio::test]
    async fn test_network_switch_cancels_pending_command() {
        use land_wallet::test_utils::{ALICE, MockProvider};

        let provider = MockProvider::new();
        provider.set_accounts(Ok(vec![ALICE]));
        provider.hold_submissions();
        let (mut sessions, dispatcher) = wallet_parts(&provider);
        sessions.initialize().await.unwrap();
        let session = sessions.session();

        assert!(provider.emit(ProviderEvent::NetworkChanged(5)));
        let outcome = follow_events(
            &mut sessions,
            dispatcher.toggle_for_sale(&session, U256::from(1u64), true),
        )
        .await;

        assert_eq!(outcome, TransactionOutcome::Failed(WalletError::NetworkChanged));
        assert_eq!(sessions.session().account(), Some(ALICE));
    }
}
