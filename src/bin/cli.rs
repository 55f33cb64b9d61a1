//! shardcache CLI Client
//!
//! Command-line interface for poking at a sharded cache of Redis/Valkey
//! servers. Built with the `redis` feature.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use shardcache::protocol::{Command, Reply};
use shardcache::{Backend, CacheClient, ClientConfig, Expiry, KeyTtl, RedisBackend, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// shardcache CLI
#[derive(Parser, Debug)]
#[command(name = "shardcache-cli")]
#[command(about = "CLI for a sharded cache")]
#[command(version)]
struct Args {
    /// Server location; repeat (or comma-separate) to shard
    #[arg(short, long = "location", default_value = "redis://127.0.0.1:6379")]
    locations: Vec<String>,

    /// Key prefix
    #[arg(long, default_value = "")]
    prefix: String,

    /// Key version
    #[arg(long, default_value = "1")]
    version: i64,

    /// Serializer (bincode, json)
    #[arg(long, default_value = "bincode")]
    serializer: String,

    /// Compressor (none, gzip, lz4, zstd)
    #[arg(long, default_value = "none")]
    compressor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        key: String,
    },

    /// Set a key-value pair
    Set {
        key: String,
        value: String,

        /// Expiry in seconds (omit for no expiry)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete keys
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Get several keys at once
    Mget {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Increment an integer
    Incr {
        key: String,
        #[arg(default_value = "1")]
        delta: i64,
    },

    /// Show the remaining lifetime of a key
    Ttl {
        key: String,
    },

    /// Append values to a list
    Rpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Show a range of a list
    Lrange {
        key: String,
        #[arg(default_value = "0")]
        start: i64,
        #[arg(default_value = "-1", allow_hyphen_values = true)]
        stop: i64,
    },

    /// Show which endpoint owns each key
    Shard {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Ping every endpoint
    Ping,
}

/// Integers are stored as integers so `incr` works on them
fn parse_value(raw: &str) -> Value {
    raw.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::from(raw))
}

fn render(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
    }
}

fn execute<B: Backend>(client: &CacheClient<B>, command: Commands) -> shardcache::Result<()> {
    match command {
        Commands::Get { key } => match client.get(key.as_str())? {
            Some(value) => println!("{}", render(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value, ttl } => {
            let expiry = ttl.map_or(Expiry::Never, |s| Expiry::After(Duration::from_secs(s)));
            client.set(key.as_str(), parse_value(&value), expiry)?;
            println!("OK");
        }
        Commands::Del { keys } => {
            println!("(integer) {}", client.delete_many(keys.iter())?);
        }
        Commands::Mget { keys } => {
            for (key, value) in client.get_many(keys.iter())? {
                println!("{} = {}", key, render(&value));
            }
        }
        Commands::Incr { key, delta } => {
            println!("(integer) {}", client.incr(key.as_str(), delta)?);
        }
        Commands::Ttl { key } => match client.ttl(key.as_str())? {
            KeyTtl::Missing => println!("(missing)"),
            KeyTtl::Persistent => println!("(no expiry)"),
            KeyTtl::Expires(d) => println!("{:.3}s", d.as_secs_f64()),
        },
        Commands::Rpush { key, values } => {
            let values: Vec<Value> = values.iter().map(|v| parse_value(v)).collect();
            println!("(integer) {}", client.rpush(key.as_str(), values)?);
        }
        Commands::Lrange { key, start, stop } => {
            for (i, value) in client.lrange(key.as_str(), start, stop)?.iter().enumerate() {
                println!("{}) {}", i + 1, render(value));
            }
        }
        Commands::Shard { keys } => {
            for key in &keys {
                let index = client.shard_for(key.as_str())?;
                println!("{} -> {} ({})", key, index, client.endpoints()[index]);
            }
        }
        Commands::Ping => {
            for index in 0..client.pool().len() {
                let address = client.pool().address(index);
                match client.pool().execute(index, &Command::Ping) {
                    Ok(Reply::Bulk(b)) => println!("{}: {}", address, String::from_utf8_lossy(&b)),
                    Ok(other) => println!("{}: {:?}", address, other),
                    Err(e) => println!("{}: {}", address, e),
                }
            }
        }
    }
    Ok(())
}

fn run<B: Backend>(backend: B, config: ClientConfig, command: Commands) -> shardcache::Result<()> {
    let client = CacheClient::new(backend, config)?;
    let result = execute(&client, command);
    client.close();
    result
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = match (args.serializer.parse(), args.compressor.parse()) {
        (Ok(serializer), Ok(compressor)) => ClientConfig::builder()
            .locations(args.locations)
            .key_prefix(args.prefix)
            .version(args.version)
            .serializer(serializer)
            .compressor(compressor)
            .default_timeout(None)
            .build(),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(RedisBackend::new(), config, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
