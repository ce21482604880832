use atrium_repo::blockstore::{AsyncBlockStoreWrite, CarStore, SHA2_256};
use atrium_repo::Cid;
use haven_core::{PdsError, PdsResult};

/// Packs a commit's new blocks into a CAR v1 file with `root` as its single
/// root CID — the payload a firehose commit event carries so a subscriber
/// can verify the write without a separate fetch.
pub async fn build_car(root: Cid, blocks: &[(Cid, Vec<u8>)]) -> PdsResult<Vec<u8>> {
    let mut car_buf = Vec::new();
    let mut car_store = CarStore::create_with_roots(std::io::Cursor::new(&mut car_buf), [root])
        .await
        .map_err(|e| PdsError::storage(format!("failed to create CAR: {e}")))?;

    for (cid, block) in blocks {
        car_store
            .write_block(cid.codec(), SHA2_256, block)
            .await
            .map_err(|e| PdsError::storage(format!("failed to write block to CAR: {e}")))?;
    }

    drop(car_store);
    Ok(car_buf)
}
