use anyhow::{Context, bail};
use rust_decimal::Decimal;
use tracing_subscriber::{EnvFilter, fmt};

use broker_client::core::{Market, Side};
use broker_client::execution::WatchEvent;
use broker_client::{BrokerClient, BrokerConfig};

const USAGE: &str = "usage: broker-client <command>
  orders <market>
  order <id>
  place <market> <side> <price> <amount>
  cancel-all <market>
  max-size <market> <side> <price>
  capacity <market>
  watch <id>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,broker_client=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = BrokerConfig::from_env().context("Failed to read broker config")?;
    let client = BrokerClient::connect(&config).context("Failed to build broker client")?;

    match (command.as_str(), &args[1..]) {
        ("orders", [market]) => {
            for order in client.list_orders(&market.parse()?).await? {
                println!("{}", serde_json::to_string(&order)?);
            }
        }
        ("order", [id]) => {
            println!("{}", serde_json::to_string(&client.get_order(id).await?)?);
        }
        ("place", [market, side, price, amount]) => {
            let id = client
                .place(&market.parse()?, side.parse()?, decimal(price)?, decimal(amount)?)
                .await?;
            println!("{}", id);
        }
        ("cancel-all", [market]) => {
            for id in client.cancel_all(&market.parse()?).await? {
                println!("{}", id);
            }
        }
        ("max-size", [market, side, price]) => {
            let market: Market = market.parse()?;
            let side: Side = side.parse()?;
            println!("{}", client.max_order_size(&market, side, decimal(price)?).await?);
        }
        ("capacity", [market]) => {
            let quote = client.trading_capacity(&market.parse()?).await?;
            println!("{}", serde_json::to_string(&quote)?);
        }
        ("watch", [id]) => watch(&client, id).await?,
        _ => bail!(USAGE),
    }

    Ok(())
}

async fn watch(client: &BrokerClient, id: &str) -> anyhow::Result<()> {
    let handle = client.watch_order_fill_amounts(id, None);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping watch on {}", id);
                handle.stop();
                return Ok(());
            }
            event = handle.next() => match event {
                Some(WatchEvent::Fill(fill)) => println!("{}", serde_json::to_string(&fill)?),
                Some(WatchEvent::Done(status)) => {
                    println!("{}", status);
                    return Ok(());
                }
                Some(WatchEvent::Error(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        }
    }
}

fn decimal(raw: &str) -> anyhow::Result<Decimal> {
    raw.parse::<Decimal>()
        .with_context(|| format!("{:?} is not a decimal", raw))
}
