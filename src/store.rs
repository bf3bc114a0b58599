use {super::*, std::io::Write};

/// Durable share chain snapshots. A save writes the whole chain to a
/// scratch file, fsyncs, and renames over the previous snapshot, so a crash
/// mid-write leaves the committed snapshot untouched.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    path: PathBuf,
}

impl Store {
    pub(crate) fn new(data_dir: &std::path::Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        Ok(Self {
            path: data_dir.join("sharechain.dat"),
        })
    }

    pub(crate) fn save(&self, shares: &[Share]) -> Result {
        let mut bytes = Vec::new();
        sharewire::write_shares(&mut bytes, shares)?;

        let scratch = self.path.with_extension("dat.new");

        {
            let mut file = fs::File::create(&scratch)
                .with_context(|| format!("failed to create {}", scratch.display()))?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&scratch, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }

    /// Returns `None` when no snapshot has ever been committed.
    pub(crate) fn load(&self, network: &Network) -> Result<Option<Vec<Share>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        let mut slice = &bytes[..];
        let shares = sharewire::read_shares(&mut slice, network)
            .with_context(|| format!("corrupt share chain snapshot {}", self.path.display()))?;

        ensure!(
            slice.is_empty(),
            "corrupt share chain snapshot {}: {} trailing bytes",
            self.path.display(),
            slice.len(),
        );

        Ok(Some(shares))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::testing, tempfile::TempDir};

    fn network() -> Network {
        Network::regtest()
    }

    #[test]
    fn absent_snapshot_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();

        assert!(store.load(&network()).unwrap().is_none());
    }

    #[test]
    fn saves_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let network = network();

        let a = testing::share(BlockHash::all_zeros(), 0, &network);
        let b = testing::share(a.hash(), 1, &network);
        let shares = vec![b, a];

        store.save(&shares).unwrap();
        assert_eq!(store.load(&network).unwrap().unwrap(), shares);
    }

    #[test]
    fn interrupted_save_leaves_the_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let network = network();

        let shares = vec![testing::share(BlockHash::all_zeros(), 0, &network)];
        store.save(&shares).unwrap();

        // a crash mid-write leaves a partial scratch file behind
        fs::write(dir.path().join("sharechain.dat.new"), b"partial garbage").unwrap();

        assert_eq!(store.load(&network).unwrap().unwrap(), shares);
    }

    #[test]
    fn corrupt_snapshot_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let network = network();

        store
            .save(&[testing::share(BlockHash::all_zeros(), 0, &network)])
            .unwrap();

        let mut bytes = fs::read(dir.path().join("sharechain.dat")).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        bytes.push(0);
        fs::write(dir.path().join("sharechain.dat"), bytes).unwrap();

        assert!(store.load(&network).is_err());
    }
}
