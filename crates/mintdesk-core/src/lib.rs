//! Operation layer of the mintdesk asset dashboard.
//!
//! Everything takes an explicit [`Session`] (chain client plus wallet
//! signer); there is no global state. Assets are classified into the closed
//! [`AssetKind`] set and every mutating operation matches on it
//! exhaustively.

pub mod amount;
pub mod asset;
pub mod batch;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod create;
pub mod dispatcher;
pub mod error;
pub mod resolver;
pub mod rpc;
pub mod submit;
pub mod telemetry;
pub mod tree_sizing;
pub mod upload;
pub mod wallet;

pub use asset::{Asset, AssetKind, CollectionRef, CreatedAsset, OperationReceipt, TokenAccount};
pub use batch::{BatchMinter, MintBatchReport, NftTemplate};
pub use catalog::{AssetCatalog, CollectionSummary, OwnedAssets};
pub use config::DeskConfig;
pub use create::{AssetCreator, FungibleParams, NftParams, NftStandard, TransferFee};
pub use dispatcher::{Operation, OperationDispatcher};
pub use error::{DeskError, RetryClass};
pub use resolver::AddressResolver;
pub use rpc::{ChainClient, HttpChainClient};
pub use submit::{OperationPhase, PhaseObserver, Session};
pub use tree_sizing::MerkleTreeConfig;
pub use upload::{PinataClient, PinningService, UploadCoordinator, UploadResult};
pub use wallet::{LocalKeypairSigner, SignError, WalletSigner};
