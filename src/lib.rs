use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    arguments::Arguments,
    bitcoin::{
        BlockHash,
        hashes::{Hash, sha256d},
    },
    clap::{Args, Parser},
    connection::Connection,
    parking_lot::Mutex,
    peer::Peer,
    peer_manager::PeerManager,
    rand::Rng,
    settings::Settings,
    sharechain::ShareChain,
    sharewire::{
        Addr, Message, Network, PROTOCOL_VERSION, PoolAddress, Share, ShareReply,
        ShareReplyResult, ShareReq, Version,
    },
    std::{
        collections::HashMap,
        env, fs, io,
        net::{IpAddr, Ipv6Addr, SocketAddr},
        path::PathBuf,
        process,
        sync::Arc,
        time::{Duration, Instant},
    },
    store::Store,
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{
            TcpStream,
            tcp::{OwnedReadHalf, OwnedWriteHalf},
        },
        runtime::Runtime,
        sync::mpsc,
        time::{MissedTickBehavior, interval, timeout},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
    tracing_appender::non_blocking,
    tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt},
};

mod arguments;
mod connection;
mod logs;
mod options;
mod peer;
mod peer_manager;
mod settings;
mod sharechain;
mod signal;
mod store;
mod subcommand;
#[cfg(test)]
mod testing;

pub const USER_AGENT: &str = "pyrite/0.1.0";

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const PING_INTERVAL: Duration = Duration::from_secs(15);
pub(crate) const SUPERVISOR_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const STATUS_INTERVAL: Duration = Duration::from_secs(5);

pub(crate) const MESSAGE_CHANNEL_CAPACITY: usize = 32;
pub(crate) const SHARES_CHANNEL_CAPACITY: usize = 16;
pub(crate) const NEED_CHANNEL_CAPACITY: usize = 16;
pub(crate) const ADDRS_CHANNEL_CAPACITY: usize = 16;

/// Ancestors requested per `sharereq`, and the most we serve in one reply.
pub(crate) const PARENTS_PER_REQUEST: u64 = 500;

pub(crate) const ADDRESS_BOOK_CAPACITY: usize = 256;

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub(crate) fn random_request_id() -> sha256d::Hash {
    sha256d::Hash::from_byte_array(rand::rng().random())
}

pub fn main() {
    let _guard = logs::init();

    let args = Arguments::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = signal::shutdown_token();

            match args.run(cancel_token).await {
                Err(err) => {
                    eprintln!("error: {err}");

                    for (i, cause) in err.chain().skip(1).enumerate() {
                        if i == 0 {
                            eprintln!();
                            eprintln!("because:");
                        }
                        eprintln!("- {cause}");
                    }

                    if env::var_os("RUST_BACKTRACE")
                        .map(|val| val == "1")
                        .unwrap_or_default()
                    {
                        eprintln!();
                        eprintln!("{}", err.backtrace());
                    }
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}
