use super::*;

mod decode;
mod node;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Decode a hex share payload and print its hashes")]
    Decode(decode::Decode),
    #[command(about = "Run a share chain node")]
    Node(node::Node),
}

impl Subcommand {
    pub(crate) async fn run(self, settings: Settings, cancel_token: CancellationToken) -> Result {
        match self {
            Self::Decode(decode) => decode.run(settings),
            Self::Node(node) => node.run(settings, cancel_token).await,
        }
    }
}
