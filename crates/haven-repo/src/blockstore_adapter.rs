use atrium_repo::blockstore::{AsyncBlockStoreRead, AsyncBlockStoreWrite, SHA2_256};
use atrium_repo::{Cid, Multihash};
use haven_core::keys::block_key;
use haven_core::store::{Store, StoreTx};
use sha2::{Digest, Sha256};

pub fn cid_to_bytes(cid: &Cid) -> Vec<u8> {
    cid.to_bytes()
}

pub fn cid_from_bytes(bytes: &[u8]) -> Result<Cid, String> {
    Cid::read_bytes(std::io::Cursor::new(bytes)).map_err(|e| format!("invalid CID bytes: {e}"))
}

fn compute_cid(
    codec: u64,
    hash_code: u64,
    contents: &[u8],
) -> Result<Cid, atrium_repo::blockstore::Error> {
    if hash_code != SHA2_256 {
        return Err(atrium_repo::blockstore::Error::UnsupportedHash(hash_code));
    }
    let digest = Sha256::digest(contents);
    let mh = Multihash::wrap(hash_code, digest.as_slice())
        .map_err(|e| atrium_repo::blockstore::Error::Other(Box::new(e)))?;
    Ok(Cid::new_v1(codec, mh))
}

/// Read+write blockstore bridging a `StoreTx` to atrium-repo, scoped to one
/// actor's blocks (`blocks/<did>/<cid>`). Every block it writes during the
/// transaction is also kept in `written`, so the caller can build the
/// commit's CAR payload without a second read pass over the store.
pub struct TxBlockAdapter<'a, Tx: StoreTx> {
    tx: &'a mut Tx,
    did: String,
    pub written: Vec<(Cid, Vec<u8>)>,
}

impl<'a, Tx: StoreTx> TxBlockAdapter<'a, Tx> {
    pub fn new(tx: &'a mut Tx, did: String) -> Self {
        Self {
            tx,
            did,
            written: Vec::new(),
        }
    }
}

impl<'a, Tx: StoreTx> AsyncBlockStoreRead for TxBlockAdapter<'a, Tx> {
    async fn read_block_into(
        &mut self,
        cid: Cid,
        contents: &mut Vec<u8>,
    ) -> Result<(), atrium_repo::blockstore::Error> {
        let key = block_key(&self.did, &cid_to_bytes(&cid));
        let data = self
            .tx
            .get(&key)
            .await
            .map_err(|e| atrium_repo::blockstore::Error::Other(Box::new(e)))?;
        match data {
            Some(block) => {
                contents.extend_from_slice(&block);
                Ok(())
            }
            None => Err(atrium_repo::blockstore::Error::CidNotFound),
        }
    }
}

impl<'a, Tx: StoreTx> AsyncBlockStoreWrite for TxBlockAdapter<'a, Tx> {
    async fn write_block(
        &mut self,
        codec: u64,
        hash: u64,
        contents: &[u8],
    ) -> Result<Cid, atrium_repo::blockstore::Error> {
        let cid = compute_cid(codec, hash, contents)?;
        let key = block_key(&self.did, &cid_to_bytes(&cid));
        self.tx
            .set(&key, contents)
            .await
            .map_err(|e| atrium_repo::blockstore::Error::Other(Box::new(e)))?;
        self.written.push((cid, contents.to_vec()));
        Ok(cid)
    }
}

/// Read-only blockstore bridging a plain `Store`, used by `getRecord` — a
/// lookup doesn't need a transaction, only a consistent snapshot read.
pub struct ReadBlockAdapter<'a, S: Store> {
    store: &'a S,
    did: String,
}

impl<'a, S: Store> ReadBlockAdapter<'a, S> {
    pub fn new(store: &'a S, did: String) -> Self {
        Self { store, did }
    }
}

impl<'a, S: Store> AsyncBlockStoreRead for ReadBlockAdapter<'a, S> {
    async fn read_block_into(
        &mut self,
        cid: Cid,
        contents: &mut Vec<u8>,
    ) -> Result<(), atrium_repo::blockstore::Error> {
        let key = block_key(&self.did, &cid_to_bytes(&cid));
        let data = self
            .store
            .get(&key)
            .await
            .map_err(|e| atrium_repo::blockstore::Error::Other(Box::new(e)))?;
        match data {
            Some(block) => {
                contents.extend_from_slice(&block);
                Ok(())
            }
            None => Err(atrium_repo::blockstore::Error::CidNotFound),
        }
    }
}
