use clap::{Parser, Subcommand, ValueEnum};
use crazy_eights::config::{OrderPolicy, PassPolicy, Rules};
use crazy_eights::manager::{GameManager, Report};
use crazy_eights::secret::TerminalSecrets;
use crazy_eights::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Pass {
    AfterDraw,
    NoPlayableCard,
}

#[derive(Clone, Copy, ValueEnum)]
enum Order {
    ReadOnly,
    ClaimTurn,
}

#[derive(Parser)]
#[command(name = "crazy-eights", version)]
#[command(about = "Play Crazy Eights one command at a time")]
struct Args {
    /// Game directory
    #[arg(short, long, env = "CRAZY_EIGHTS_GAME")]
    game: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the game directory and set the admin password
    Init {
        #[arg(long, value_enum, default_value = "after-draw")]
        pass_policy: Pass,
        #[arg(long, value_enum, default_value = "read-only")]
        order_policy: Order,
    },
    /// Register a player (admin only, not while a game is running)
    AddUser { name: String },
    /// Unregister a player (admin only, not while a game is running)
    RemoveUser { name: String },
    /// Deal the cards (admin only)
    Start {
        /// Shuffle deterministically
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the turn order
    Order {
        #[arg(short, long)]
        user: String,
    },
    /// Play a card from your hand, e.g. 8H or 10S
    Play {
        card: String,
        #[arg(short, long)]
        user: String,
    },
    /// Take the top card of the draw pile
    Draw {
        #[arg(short, long)]
        user: String,
    },
    /// End your turn after drawing
    Pass {
        #[arg(short, long)]
        user: String,
    },
    /// Show a hand: your own, or anyone's as admin
    Cards {
        target: String,
        #[arg(short, long)]
        user: String,
    },
}

fn policies(pass: Pass, order: Order) -> Rules {
    let pass_policy = match pass {
        Pass::AfterDraw => PassPolicy::AfterDraw,
        Pass::NoPlayableCard => PassPolicy::NoPlayableCard,
    };
    let order_policy = match order {
        Order::ReadOnly => OrderPolicy::ReadOnly,
        Order::ClaimTurn => OrderPolicy::ClaimTurn,
    };
    Rules::default()
        .with_pass_policy(pass_policy)
        .with_order_policy(order_policy)
}

fn run(args: Args) -> Result<Report, Error> {
    let open = || GameManager::open(&args.game, TerminalSecrets);
    match args.command {
        Command::Init {
            pass_policy,
            order_policy,
        } => GameManager::init(&args.game, policies(pass_policy, order_policy), TerminalSecrets)?
            .initialized(),
        Command::AddUser { name } => open()?.add_user(&name),
        Command::RemoveUser { name } => open()?.remove_user(&name),
        Command::Start { seed } => match seed {
            Some(seed) => open()?.with_seed(seed).start(),
            None => open()?.start(),
        },
        Command::Order { user } => open()?.order(&user),
        Command::Play { card, user } => open()?.play(&card, &user),
        Command::Draw { user } => open()?.draw(&user),
        Command::Pass { user } => open()?.pass(&user),
        Command::Cards { target, user } => open()?.cards(&target, &user),
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("CRAZY_EIGHTS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
