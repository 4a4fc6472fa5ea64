use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use kconduit::assistant::{build_provider, report, ProviderKind};
use kconduit::cluster::types::ProduceRecord;
use kconduit::cluster::{ClusterDriver, MemoryCluster};
use kconduit::config::Config;
use kconduit::consumer::{event_channel, format_bytes, parse_start_offset, ConsumerSession};
use kconduit::error::Result;
use kconduit::{logging, KconduitEngine};

const CONSUME_WINDOW: Duration = Duration::from_secs(2);

const HELP: &str = "\
Commands:
  :topics                             list topics
  :groups                             consumer groups with lag
  :brokers                            brokers
  :acls                               ACLs
  :produce <topic> <key> <value>      produce one message
  :consume <topic> [oldest|newest|N]  consume for a short window
  :provider                           switch completion provider
  :quit
Anything else is sent to the assistant.";

// ========================================
// SANDBOX
// ========================================

/// The wire driver is not part of this build; the REPL runs against an
/// in-memory cluster seeded with a little data.
async fn sandbox_cluster(config: &Config) -> Result<Arc<MemoryCluster>> {
    let addresses: Vec<&str> = config.cluster.brokers.iter().map(String::as_str).collect();
    let cluster = Arc::new(MemoryCluster::with_brokers(&addresses));

    cluster.create_topic("orders", 3, 1).await?;
    cluster.create_topic("payments", 1, 1).await?;
    for i in 0..9 {
        let record = ProduceRecord {
            key: Some(Bytes::from(format!("order-{}", i))),
            value: Bytes::from(format!("{{\"id\":{},\"amount\":{}}}", i, i * 10)),
            headers: vec![("source".to_string(), "sandbox".to_string())],
        };
        cluster.produce("orders", record).await?;
    }

    cluster.join_group("billing", "billing-worker");
    for partition in 0..3 {
        cluster.commit_offset("billing", "orders", partition, 1);
    }
    Ok(cluster)
}

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init(&config.log)?;

    let cluster = sandbox_cluster(&config).await?;
    let engine = KconduitEngine::new(cluster, &config);
    let (mut kind, mut interpreter) = engine.interpreter(&config)?;

    info!(brokers = ?config.cluster.brokers, provider = %kind, "kconduit sandbox started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    write_out(&mut stdout, &format!("kconduit sandbox ({} / {})\n{}\n", kind, kind.status(&config.assistant), HELP)).await?;

    loop {
        write_out(&mut stdout, "> ").await?;
        let Some(line) = lines.next_line().await.map_err(io_error)? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        let output = match words.next().unwrap_or_default() {
            ":quit" | ":q" => break,
            ":help" => HELP.to_string(),
            ":topics" => list_topics(&engine).await,
            ":groups" => match engine.admin.consumer_groups().await {
                Ok(groups) => report::render_groups(&groups),
                Err(e) => format!("Error: {}", e),
            },
            ":brokers" => list_brokers(&engine).await,
            ":acls" => list_acls(&engine).await,
            ":produce" => {
                let topic = words.next().unwrap_or_default();
                let key = words.next().unwrap_or_default();
                let value = words.collect::<Vec<_>>().join(" ");
                match engine.admin.produce_message(topic, key, &value).await {
                    Ok((partition, offset)) => format!("Produced to {} partition {} offset {}", topic, partition, offset),
                    Err(e) => format!("Error: {}", e),
                }
            }
            ":consume" => {
                let topic = words.next().unwrap_or_default();
                consume_window(&engine, &config, topic, words.next().unwrap_or("oldest")).await
            }
            ":provider" => {
                kind = kind.next();
                match build_provider(kind, &config.assistant) {
                    Ok(provider) => {
                        interpreter.set_provider(provider);
                        format!("Provider: {} ({}) - {}", kind, kind.model(&config.assistant), kind.status(&config.assistant))
                    }
                    Err(e) => format!("Error: {}", e),
                }
            }
            _ => report::render(&interpreter.run(line).await),
        };

        write_out(&mut stdout, &format!("{}\n", output)).await?;
    }

    Ok(())
}

// ========================================
// COMMANDS
// ========================================

async fn list_topics(engine: &KconduitEngine) -> String {
    match engine.admin.topic_details().await {
        Ok(topics) if topics.is_empty() => "No topics".to_string(),
        Ok(topics) => topics
            .iter()
            .map(|t| format!("{:<30} partitions={:<4} rf={}", t.name, t.partitions, t.replication_factor))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => format!("Error: {}", e),
    }
}

async fn list_brokers(engine: &KconduitEngine) -> String {
    match engine.admin.brokers().await {
        Ok(brokers) => brokers
            .iter()
            .map(|b| {
                format!(
                    "{:<4} {}:{:<6} {:?} {}{}",
                    b.id,
                    b.host,
                    b.port,
                    b.status,
                    b.api_version,
                    if b.is_controller { " (controller)" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => format!("Error: {}", e),
    }
}

async fn list_acls(engine: &KconduitEngine) -> String {
    match engine.admin.list_acls().await {
        Ok(acls) if acls.is_empty() => "No ACLs".to_string(),
        Ok(acls) => acls
            .iter()
            .map(|a| {
                format!(
                    "{} {} {} on {} {} ({}) from {}",
                    a.principal, a.permission, a.operation, a.resource_type, a.resource_name, a.pattern_type, a.host
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => format!("Error: {}", e),
    }
}

async fn consume_window(engine: &KconduitEngine, config: &Config, topic: &str, start: &str) -> String {
    let start = match parse_start_offset(start) {
        Ok(start) => start,
        Err(e) => return format!("Error: {}", e),
    };

    let (tx, mut rx) = event_channel(&config.consumer);
    let handle = engine.consumer.spawn(topic, start, tx);
    let mut session = ConsumerSession::new(topic, start);

    let deadline = tokio::time::sleep(CONSUME_WINDOW);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = rx.recv() => match event {
                Some(event) => { session.apply(event); }
                None => break,
            },
        }
    }

    if let Err(e) = handle.stop().await {
        warn!(topic = %topic, error = %e, "Consumer stopped with error");
        return format!("Error: {}", e);
    }

    let mut out: Vec<String> = session
        .messages()
        .iter()
        .map(|m| format!("[p{} @{}] {} = {}", m.partition, m.offset, m.key_preview(), m.value_preview()))
        .collect();
    out.push(format!("{} message(s), {}", session.messages().len(), format_bytes(session.total_bytes())));
    if let Some(err) = session.last_error() {
        out.push(format!("Last error: {}", err));
    }
    out.join("\n")
}

async fn write_out(stdout: &mut tokio::io::Stdout, text: &str) -> Result<()> {
    stdout.write_all(text.as_bytes()).await.map_err(io_error)?;
    stdout.flush().await.map_err(io_error)
}

fn io_error(e: std::io::Error) -> kconduit::KconduitError {
    kconduit::KconduitError::Config(format!("terminal I/O failed: {}", e))
}
