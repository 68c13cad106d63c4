use anyhow::Result;
use checkout_engine::{purchase_types::Buyer, IdentityProvider};
use clap::{Args, Parser, Subcommand};
use log::*;

mod formatting;
mod profile_manager;
mod purchase;

use crate::{
    formatting::format_buyer,
    profile_manager::ProfileIdentity,
    purchase::{buy, print_item, BuyParams, CardArgs},
};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Buy plants from the storefront from your terminal")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "item", about = "Show a catalog item")]
    Item {
        /// The item identifier
        id: String,
    },
    #[clap(name = "buy", about = "Buy an item with a card payment")]
    Buy(BuyArgs),
    #[clap(name = "sign-in", about = "Remember who is buying")]
    SignIn {
        #[arg(short = 'n', long = "name")]
        name: String,
        #[arg(short = 'e', long = "email")]
        email: String,
        #[arg(short = 'a', long = "avatar")]
        avatar: Option<String>,
    },
    #[clap(name = "sign-out")]
    SignOut,
    #[clap(name = "whoami")]
    WhoAmI,
}

#[derive(Debug, Args)]
pub struct BuyArgs {
    /// The item to buy
    #[arg(short = 'i', long = "item")]
    item: String,
    /// Number of units. Anything above the available stock is reduced to what is available.
    #[arg(short = 'q', long = "quantity")]
    quantity: Option<String>,
    /// Shipping address. You are prompted for it if omitted.
    #[arg(short = 'a', long = "address")]
    address: Option<String>,
    /// Card number. You are prompted for the card details if omitted.
    #[arg(long = "card", requires_all = ["exp_month", "exp_year", "cvc"])]
    card: Option<String>,
    #[arg(long = "exp-month")]
    exp_month: Option<u8>,
    #[arg(long = "exp-year")]
    exp_year: Option<u16>,
    #[arg(long = "cvc")]
    cvc: Option<String>,
    /// Pay without asking for confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,
}

impl From<BuyArgs> for BuyParams {
    fn from(args: BuyArgs) -> Self {
        let card = match (args.card, args.exp_month, args.exp_year, args.cvc) {
            (Some(number), Some(exp_month), Some(exp_year), Some(cvc)) => {
                Some(CardArgs { number, exp_month, exp_year, cvc })
            },
            _ => None,
        };
        Self { item: args.item.into(), quantity: args.quantity, address: args.address, card, assume_yes: args.yes }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Arguments::parse();
    if let Err(e) = run(args.command).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Item { id } => print_item(&id.into()).await,
        Command::Buy(args) => buy(args.into()).await,
        Command::SignIn { name, email, avatar } => {
            let mut identity = ProfileIdentity::load_default()?;
            let buyer = match avatar {
                Some(url) => Buyer::new(name, email).with_avatar_url(url),
                None => Buyer::new(name, email),
            };
            identity.sign_in(buyer)?;
            print!("{}", format_buyer(identity.current_buyer().as_ref())?);
            Ok(())
        },
        Command::SignOut => {
            let mut identity = ProfileIdentity::load_default()?;
            identity.sign_out()?;
            println!("Signed out");
            Ok(())
        },
        Command::WhoAmI => {
            let identity = ProfileIdentity::load_default()?;
            print!("{}", format_buyer(identity.current_buyer().as_ref())?);
            Ok(())
        },
    }
}
