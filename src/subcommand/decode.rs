use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Decode {
    #[arg(
        long,
        default_value = "sharereply",
        help = "Decode the payload as <COMMAND> (sharereply or shares)."
    )]
    command: String,
    #[arg(help = "Hex-encoded message payload.")]
    payload: String,
}

impl Decode {
    pub(crate) fn run(self, settings: Settings) -> Result {
        let payload = hex::decode(self.payload.trim()).context("payload is not valid hex")?;

        let message = Message::decode_payload(&self.command, &payload, &settings.network)
            .with_context(|| format!("failed to decode payload as {}", self.command))?;

        let shares = match message {
            Message::ShareReply(reply) => {
                println!("request id: {}", reply.id);
                println!("result: {}", reply.result);
                reply.shares
            }
            Message::Shares(shares) => shares,
            message => bail!("{} payloads carry no shares", message.command()),
        };

        println!("shares: {}", shares.len());

        for share in shares {
            println!();
            println!("hash: {}", share.hash());
            println!("  type: {}", share.share_type);
            println!("  previous share: {}", share.previous_share_hash());
            println!("  height: {}", share.share_info.abs_height);
            println!("  ref hash: {}", share.hashes.ref_hash);
            println!("  gen tx hash: {}", share.hashes.gen_tx_hash);
            println!("  merkle root: {}", share.hashes.merkle_root);
            println!("  pow hash: {}", share.hashes.pow_hash);
            println!("  valid: {}", share.is_valid());
        }

        Ok(())
    }
}
