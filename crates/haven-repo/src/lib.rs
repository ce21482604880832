pub mod blockstore_adapter;
pub mod car;
pub mod operations;
pub mod writer;

pub use blockstore_adapter::{ReadBlockAdapter, TxBlockAdapter, cid_from_bytes, cid_to_bytes};
pub use car::build_car;
pub use operations::{RecordOutput, RecordWriteOutput, create_repo, get_record};
pub use writer::{RecordWriteResult, create_record, delete_record, put_record};
