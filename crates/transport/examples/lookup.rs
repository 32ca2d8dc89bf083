//! Resolve a name against a public DoH resolver.
//!
//! Usage: lookup [nameserver] [name]
//!
//!     cargo run --example lookup -- https://1.1.1.1/dns-query example.com

use doh_executor_transport::DohExecutor;
use hickory_proto::op::Query;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let nameserver = args.next().unwrap_or_else(|| "https://1.1.1.1/dns-query".to_string());
    let name = args.next().unwrap_or_else(|| "example.com.".to_string());

    let executor = DohExecutor::new(&nameserver)?;

    let mut query = Query::new();
    query.set_name(Name::from_str(&name)?);
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let message = executor.query(query).await?;

    println!("response code: {}", message.metadata.response_code);
    for record in message.answers {
        println!("{record}");
    }
    Ok(())
}
