//! End-to-end tests of the operation layer against in-memory chain, wallet
//! and pinning fakes. Every submitted transaction is decoded from its wire
//! bytes before inspection.

mod common;

use std::sync::{Arc, Mutex};

use asset_programs::associated_token::derive_associated_token_address;
use asset_programs::ids::{
    ACCOUNT_COMPRESSION_PROGRAM_ID, ASSOCIATED_TOKEN_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID,
    MPL_CORE_PROGRAM_ID, TOKEN_2022_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use asset_programs::TokenProgram;
use common::*;
use mintdesk_core::asset::{AssetContent, AssetProof, LeafData};
use mintdesk_core::classifier::RawAssetRecord;
use mintdesk_core::upload::{ImageFile, MetadataDocument, MetadataInput};
use mintdesk_core::*;
use sol_wire::{Address, SYSTEM_PROGRAM_ID};

const MINT: Address = Address::new([0x31; 32]);
const RECIPIENT: Address = Address::new([0x32; 32]);
const TREE: Address = Address::new([0x33; 32]);
const COLLECTION: Address = Address::new([0x34; 32]);

fn fungible(balance: u64) -> Asset {
    Asset {
        id: MINT,
        kind: AssetKind::FungibleToken {
            decimals: 6,
            balance,
        },
        program: TOKEN_PROGRAM_ID,
        collection: None,
        content: AssetContent::default(),
    }
}

fn legacy_nft() -> Asset {
    Asset {
        id: MINT,
        kind: AssetKind::LegacyNft,
        program: TOKEN_PROGRAM_ID,
        collection: None,
        content: AssetContent::default(),
    }
}

fn core_nft(owner: Address) -> Asset {
    Asset {
        id: MINT,
        kind: AssetKind::CoreNft { owner },
        program: MPL_CORE_PROGRAM_ID,
        collection: Some(CollectionRef(COLLECTION)),
        content: AssetContent::default(),
    }
}

fn compressed_nft(owner: Address) -> Asset {
    Asset {
        id: MINT,
        kind: AssetKind::CompressedNft {
            tree: TREE,
            leaf: LeafData {
                leaf_id: 3,
                data_hash: [0xd1; 32],
                creator_hash: [0xc1; 32],
                owner,
                delegate: None,
            },
        },
        program: BUBBLEGUM_PROGRAM_ID,
        collection: None,
        content: AssetContent::default(),
    }
}

fn proof_nodes() -> Vec<Address> {
    (0..14u8).map(|i| Address::new([0x80 + i; 32])).collect()
}

fn install_proof(chain: &FakeChain) {
    *chain.proof.lock().unwrap() = Some(AssetProof {
        root: [0xaa; 32],
        proof: proof_nodes(),
        leaf: [0xbb; 32],
        node_index: (1 << 14) + 3,
        tree_id: TREE,
    });
}

fn token_account(balance: u64, owner: Address) -> TokenAccount {
    TokenAccount {
        address: Address::new([0x35; 32]),
        owner,
        mint: MINT,
        program: TokenProgram::Legacy,
        balance,
    }
}

// ─── Local validation: nothing reaches the network ──────────────────

#[tokio::test]
async fn burn_more_than_balance_fails_before_any_network_call() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher
        .burn(&fungible(1_000), Some(1_001))
        .await
        .unwrap_err();

    assert!(matches!(err, DeskError::InvalidAmount(_)));
    assert_eq!(err.retry_class(), RetryClass::DoNotRetry);
    assert_eq!(chain.call_count(), 0);
    assert_eq!(wallet.prompt_count(), 0);
}

#[tokio::test]
async fn close_account_with_balance_makes_zero_network_calls() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher
        .close_account(&fungible(2), token_account(2, owner))
        .await
        .unwrap_err();

    assert_eq!(err, DeskError::NonZeroBalance { balance: 2 });
    assert_eq!(chain.call_count(), 0);
}

#[tokio::test]
async fn disconnected_wallet_is_reported_first() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::disconnected();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher.burn(&legacy_nft(), None).await.unwrap_err();
    assert_eq!(err, DeskError::WalletNotConnected);
    assert_eq!(err.retry_class(), RetryClass::Reprompt);
    assert_eq!(chain.call_count(), 0);
}

#[tokio::test]
async fn delegate_on_compressed_nft_is_unsupported() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher
        .delegate(&compressed_nft(owner), RECIPIENT, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeskError::UnsupportedKind {
            operation: "delegate",
            ..
        }
    ));
    assert_eq!(chain.call_count(), 0);
}

// ─── Fungible tokens ────────────────────────────────────────────────

#[tokio::test]
async fn transfer_creates_missing_destination_account_in_same_transaction() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_2022_PROGRAM_ID, vec![0; 82]);
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let receipt = dispatcher
        .transfer(&fungible(500), RECIPIENT, Some(200))
        .await
        .unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0];
    assert_eq!(
        program_ids(tx),
        vec![ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID]
    );
    assert_eq!(tx.message.instructions[0].data, vec![1]);
    assert_eq!(tx.message.instructions[1].data[0], 12);
    assert_eq!(&tx.message.instructions[1].data[1..9], &200u64.to_le_bytes());

    let destination =
        derive_associated_token_address(&RECIPIENT, &MINT, TokenProgram::Token2022).unwrap();
    assert!(tx.message.account_keys.contains(&destination));
    assert_eq!(receipt.signature, tx.signatures[0]);
}

#[tokio::test]
async fn transfer_to_existing_account_is_a_single_instruction() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_PROGRAM_ID, vec![0; 82]);
    let destination =
        derive_associated_token_address(&RECIPIENT, &MINT, TokenProgram::Legacy).unwrap();
    chain.insert_account(destination, TOKEN_PROGRAM_ID, vec![0; 165]);

    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));
    dispatcher
        .transfer(&fungible(500), RECIPIENT, Some(500))
        .await
        .unwrap();

    assert_eq!(program_ids(&chain.sent()[0]), vec![TOKEN_PROGRAM_ID]);
}

#[tokio::test]
async fn delegate_uses_approve_checked() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_PROGRAM_ID, vec![0; 82]);
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher.delegate(&fungible(10), RECIPIENT, 10).await.unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![TOKEN_PROGRAM_ID]);
    assert_eq!(tx.message.instructions[0].data[0], 13);
}

#[tokio::test]
async fn close_empty_account_returns_rent_to_wallet() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_PROGRAM_ID, vec![0; 82]);
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher
        .close_account(&fungible(0), token_account(0, owner))
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(tx.message.instructions[0].data, vec![9]);
}

#[tokio::test]
async fn unknown_mint_owner_is_rejected() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, SYSTEM_PROGRAM_ID, vec![]);
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher.burn(&fungible(5), Some(1)).await.unwrap_err();
    assert!(matches!(err, DeskError::InvalidAccountOwner { .. }));
    assert!(chain.sent().is_empty());
}

// ─── NFTs ───────────────────────────────────────────────────────────

#[tokio::test]
async fn legacy_burn_goes_through_token_metadata() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_PROGRAM_ID, vec![0; 82]);
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher.burn(&legacy_nft(), None).await.unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![TOKEN_METADATA_PROGRAM_ID]);
    assert_eq!(tx.message.instructions[0].data[0], 41);
}

#[tokio::test]
async fn legacy_transfer_moves_exactly_one_token() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_PROGRAM_ID, vec![0; 82]);
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher
        .transfer(&legacy_nft(), RECIPIENT, None)
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(
        program_ids(tx),
        vec![ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID]
    );
    let transfer = &tx.message.instructions[1].data;
    assert_eq!(&transfer[1..9], &1u64.to_le_bytes());
    assert_eq!(transfer[9], 0, "decimals");
}

#[tokio::test]
async fn core_transfer_is_collection_aware() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher
        .transfer(&core_nft(owner), RECIPIENT, None)
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![MPL_CORE_PROGRAM_ID]);
    assert_eq!(tx.message.instructions[0].data[0], 14);
    assert!(tx.message.account_keys.contains(&COLLECTION));
    assert!(tx.message.account_keys.contains(&RECIPIENT));
}

#[tokio::test]
async fn compressed_burn_fetches_a_fresh_proof() {
    let chain = FakeChain::new();
    install_proof(&chain);
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher.burn(&compressed_nft(owner), None).await.unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![BUBBLEGUM_PROGRAM_ID]);
    let data = &tx.message.instructions[0].data;
    assert_eq!(data[..8], anchor_discriminator("burn"));
    assert_eq!(data[8..40], [0xaa; 32], "root from the proof");
    for node in proof_nodes() {
        assert!(tx.message.account_keys.contains(&node));
    }
    assert!(tx.message.account_keys.contains(&ACCOUNT_COMPRESSION_PROGRAM_ID));
}

#[tokio::test]
async fn stale_proof_is_reported_for_rebuild() {
    let chain = FakeChain::new();
    install_proof(&chain);
    chain.fail_sends(
        [0],
        "Program log: Error: Invalid root recomputed from proof",
    );
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher
        .transfer(&compressed_nft(owner), RECIPIENT, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DeskError::ProofStale(_)));
    assert_eq!(err.retry_class(), RetryClass::RebuildAndResubmit);
}

#[tokio::test]
async fn tree_conflict_at_confirmation_is_reported_for_rebuild() {
    let chain = FakeChain::new();
    install_proof(&chain);
    chain.fail_confirmations(r#"{"InstructionError":[0,{"Custom":6001}]}"#);
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher
        .burn(&compressed_nft(owner), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DeskError::ProofStale(_)), "{err:?}");
    assert_eq!(err.retry_class(), RetryClass::RebuildAndResubmit);
    assert_eq!(chain.sent().len(), 1, "the transaction landed and failed");
}

#[tokio::test]
async fn failed_confirmation_of_token_transfer_is_not_a_stale_proof() {
    let chain = FakeChain::new();
    chain.insert_account(MINT, TOKEN_PROGRAM_ID, vec![0; 82]);
    chain.fail_confirmations(r#"{"InstructionError":[0,{"Custom":6001}]}"#);
    let wallet = FakeWallet::connected(1);
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher
        .transfer(&fungible(10), RECIPIENT, Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::TransactionFailed(_)));
}

#[tokio::test]
async fn compressed_transfer_names_new_owner_and_proof_path() {
    let chain = FakeChain::new();
    install_proof(&chain);
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher
        .transfer(&compressed_nft(owner), RECIPIENT, None)
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![BUBBLEGUM_PROGRAM_ID]);
    let data = &tx.message.instructions[0].data;
    assert_eq!(data[..8], anchor_discriminator("transfer"));
    assert_eq!(data[8..40], [0xaa; 32], "root from the proof");

    let accounts = instruction_accounts(tx, 0);
    assert_eq!(accounts[1], owner, "leaf owner");
    assert_eq!(accounts[2], owner, "owner stands in as delegate");
    assert_eq!(accounts[3], RECIPIENT, "new leaf owner");
    assert_eq!(accounts[4], TREE);
    assert_eq!(accounts[8..], proof_nodes()[..]);
}

#[tokio::test]
async fn core_burn_passes_collection_in_second_slot() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    dispatcher.burn(&core_nft(owner), None).await.unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![MPL_CORE_PROGRAM_ID]);
    assert_eq!(tx.message.instructions[0].data[0], 12);
    let accounts = instruction_accounts(tx, 0);
    assert_eq!(accounts[0], MINT);
    assert_eq!(accounts[1], COLLECTION);
    assert_eq!(accounts[2], owner);
}

#[tokio::test]
async fn rejection_is_distinct_and_nothing_is_sent() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::rejecting(1);
    let owner = wallet.address().unwrap();
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));

    let err = dispatcher.burn(&core_nft(owner), None).await.unwrap_err();

    assert_eq!(err, DeskError::UserRejectedSigning);
    assert_eq!(err.retry_class(), RetryClass::Reprompt);
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn observer_sees_every_phase() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: PhaseObserver = Arc::new(move |phase| sink.lock().unwrap().push(phase));
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet)).with_observer(observer);

    dispatcher.burn(&core_nft(owner), None).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            OperationPhase::Building,
            OperationPhase::Signing,
            OperationPhase::Submitting,
            OperationPhase::Confirmed,
        ]
    );
}

#[tokio::test]
async fn observer_sees_failure_of_local_checks() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: PhaseObserver = Arc::new(move |phase| sink.lock().unwrap().push(phase));
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet)).with_observer(observer);

    dispatcher
        .burn(&fungible(5), Some(6))
        .await
        .unwrap_err();

    assert_eq!(*seen.lock().unwrap(), vec![OperationPhase::Failed]);
    assert_eq!(chain.call_count(), 0);
}

// ─── Upload and creation ────────────────────────────────────────────

#[tokio::test]
async fn uploaded_metadata_resolves_to_image_bytes() {
    let pinning = FakePinning::new();
    let coordinator = UploadCoordinator::new(pinning.clone());
    let image = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a];

    let result = coordinator
        .upload(
            ImageFile {
                file_name: "logo.png".into(),
                content_type: "image/png".into(),
                bytes: image.clone(),
            },
            MetadataInput {
                name: "Desk Token".into(),
                symbol: "DESK".into(),
                description: "test token".into(),
            },
        )
        .await
        .unwrap();

    let json = pinning.fetch(&result.metadata_uri).unwrap();
    let doc: MetadataDocument = serde_json::from_slice(&json).unwrap();
    assert_eq!(doc.name, "Desk Token");
    assert_eq!(doc.image, result.image_uri);
    assert_eq!(pinning.fetch(&doc.image).unwrap(), image);
}

#[tokio::test]
async fn create_fungible_mints_supply_to_creator() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let creator = AssetCreator::new(session(&chain, &wallet));
    let upload = UploadResult {
        image_uri: "https://gateway.test/ipfs/img".into(),
        metadata_uri: "https://gateway.test/ipfs/meta".into(),
    };

    let created = creator
        .create_fungible(
            &FungibleParams {
                name: "Desk".into(),
                symbol: "DESK".into(),
                decimals: 6,
                supply: "1000".into(),
                token_program: TokenProgram::Token2022,
                transfer_fee: None,
            },
            &upload,
        )
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(
        program_ids(tx),
        vec![TOKEN_METADATA_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID]
    );
    assert_eq!(tx.signatures.len(), 2, "wallet and new mint");
    assert!(tx.message.account_keys.contains(&created.address));
    assert!(tx.message.account_keys.contains(&TOKEN_2022_PROGRAM_ID));

    let mint = &tx.message.instructions[1].data;
    assert_eq!(mint[0], 43);
    assert_eq!(&mint[2..10], &1_000_000_000u64.to_le_bytes());
}

#[tokio::test]
async fn create_fungible_rejects_bad_decimals_without_signing() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let creator = AssetCreator::new(session(&chain, &wallet));
    let upload = UploadResult {
        image_uri: String::new(),
        metadata_uri: "https://gateway.test/ipfs/meta".into(),
    };

    let err = creator
        .create_fungible(
            &FungibleParams {
                name: "Desk".into(),
                symbol: "DESK".into(),
                decimals: 10,
                supply: "1".into(),
                token_program: TokenProgram::Legacy,
                transfer_fee: None,
            },
            &upload,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::InvalidParams(_)));
    assert_eq!(wallet.prompt_count(), 0);
}

#[tokio::test]
async fn create_tree_allocates_rent_exempt_account() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let creator = AssetCreator::new(session(&chain, &wallet));

    let config = tree_sizing::recommend(1_000).unwrap();
    assert_eq!(config, MerkleTreeConfig::new(14, 64));
    let created = creator.create_tree(config).await.unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![SYSTEM_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID]);

    let create = &tx.message.instructions[0].data;
    assert_eq!(&create[4..12], &318_000u64.to_le_bytes(), "lamports");
    assert_eq!(&create[12..20], &31_800u64.to_le_bytes(), "space");
    assert_eq!(&create[20..52], ACCOUNT_COMPRESSION_PROGRAM_ID.as_bytes());
    assert_eq!(
        tx.message.instructions[1].data[..8],
        anchor_discriminator("create_tree")
    );
    assert!(tx.message.signer_keys().contains(&created.address));
}

// ─── Listing ────────────────────────────────────────────────────────

fn record(json: serde_json::Value) -> RawAssetRecord {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn owned_assets_are_split_into_nfts_and_tokens() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap().to_string();
    let collection = COLLECTION.to_string();

    *chain.records.lock().unwrap() = vec![
        record(serde_json::json!({
            "id": Address::new([1; 32]).to_string(),
            "interface": "FungibleToken",
            "ownership": { "owner": owner },
            "token_info": { "balance": 42, "decimals": 2 },
        })),
        record(serde_json::json!({
            "id": Address::new([2; 32]).to_string(),
            "interface": "MplCoreAsset",
            "ownership": { "owner": owner },
        })),
        record(serde_json::json!({
            "id": Address::new([3; 32]).to_string(),
            "interface": "MplCoreAsset",
            "ownership": { "owner": owner },
            "grouping": [{ "group_key": "collection", "group_value": collection }],
        })),
        record(serde_json::json!({
            "id": Address::new([4; 32]).to_string(),
            "interface": "V1_NFT",
            "burnt": true,
            "ownership": { "owner": owner },
        })),
    ];

    let catalog = AssetCatalog::new(session(&chain, &wallet));
    let owned = catalog
        .owned_assets(&wallet.address().unwrap())
        .await
        .unwrap();

    assert_eq!(owned.tokens.len(), 1);
    assert_eq!(owned.nfts.len(), 1);
    assert_eq!(owned.skipped, 2);

    let members = catalog.collection_assets(&COLLECTION).await.unwrap();
    assert_eq!(members.assets.len(), 1);
    assert_eq!(members.assets[0].collection, Some(CollectionRef(COLLECTION)));
}

#[tokio::test]
async fn minting_into_collection_refetches_members_after_confirmation() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let catalog = AssetCatalog::new(session(&chain, &wallet));
    let upload = UploadResult {
        image_uri: String::new(),
        metadata_uri: "https://gateway.test/ipfs/member".into(),
    };

    let minted = catalog
        .mint_into_collection(&COLLECTION, "Member", 500, &upload)
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(program_ids(tx), vec![MPL_CORE_PROGRAM_ID]);
    assert_eq!(tx.message.instructions[0].data[0], 0);
    assert!(tx.message.account_keys.contains(&COLLECTION));
    assert!(tx.message.signer_keys().contains(&minted.created.address));
    assert!(minted.members.assets.is_empty());
}

#[tokio::test]
async fn legacy_nft_creation_has_master_edition_and_single_token() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let creator = AssetCreator::new(session(&chain, &wallet));
    let upload = UploadResult {
        image_uri: String::new(),
        metadata_uri: "https://gateway.test/ipfs/nft".into(),
    };

    let created = creator
        .create_nft(
            &NftParams {
                name: "Solo".into(),
                symbol: "SOLO".into(),
                royalty_bps: 10_001,
                standard: NftStandard::Legacy {
                    token_program: TokenProgram::Legacy,
                },
            },
            &upload,
        )
        .await;
    assert!(matches!(created, Err(DeskError::Program(_))), "royalty above 100%");

    let created = creator
        .create_nft(
            &NftParams {
                name: "Solo".into(),
                symbol: "SOLO".into(),
                royalty_bps: 500,
                standard: NftStandard::Legacy {
                    token_program: TokenProgram::Legacy,
                },
            },
            &upload,
        )
        .await
        .unwrap();

    let tx = &chain.sent()[0];
    assert_eq!(
        program_ids(tx),
        vec![TOKEN_METADATA_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID]
    );
    let edition = asset_programs::token_metadata::master_edition_pda(&created.address).unwrap();
    assert!(tx.message.account_keys.contains(&edition));
    assert_eq!(&tx.message.instructions[1].data[2..10], &1u64.to_le_bytes());
}

#[tokio::test]
async fn core_nft_and_collection_creation_sign_with_new_accounts() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let creator = AssetCreator::new(session(&chain, &wallet));
    let upload = UploadResult {
        image_uri: String::new(),
        metadata_uri: "https://gateway.test/ipfs/core".into(),
    };

    let collection = creator.create_collection("Apes", &upload).await.unwrap();
    let nft = creator
        .create_nft(
            &NftParams {
                name: "Ape".into(),
                symbol: String::new(),
                royalty_bps: 0,
                standard: NftStandard::Core { collection: None },
            },
            &upload,
        )
        .await
        .unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 2);

    assert_eq!(program_ids(&sent[0]), vec![MPL_CORE_PROGRAM_ID]);
    assert_eq!(sent[0].message.instructions[0].data[0], 1);
    assert_eq!(instruction_accounts(&sent[0], 0)[0], collection.address);
    assert!(sent[0].message.signer_keys().contains(&collection.address));

    assert_eq!(program_ids(&sent[1]), vec![MPL_CORE_PROGRAM_ID]);
    assert_eq!(sent[1].message.instructions[0].data[0], 0);
    let accounts = instruction_accounts(&sent[1], 0);
    assert_eq!(accounts[0], nft.address);
    assert_eq!(accounts[1], MPL_CORE_PROGRAM_ID, "no collection");
    assert!(sent[1].message.signer_keys().contains(&nft.address));
}

#[tokio::test]
async fn transfer_fee_without_receiver_is_rejected_before_signing() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let creator = AssetCreator::new(session(&chain, &wallet));
    let upload = UploadResult {
        image_uri: String::new(),
        metadata_uri: "https://gateway.test/ipfs/meta".into(),
    };
    let mut params = FungibleParams {
        name: "Fee".into(),
        symbol: "FEE".into(),
        decimals: 2,
        supply: "10".into(),
        token_program: TokenProgram::Token2022,
        transfer_fee: Some(TransferFee {
            basis_points: 100,
            receiver: None,
        }),
    };

    let err = creator.create_fungible(&params, &upload).await.unwrap_err();
    assert!(matches!(err, DeskError::InvalidParams(_)));

    params.transfer_fee = Some(TransferFee {
        basis_points: 10_001,
        receiver: Some(RECIPIENT),
    });
    let err = creator.create_fungible(&params, &upload).await.unwrap_err();
    assert!(matches!(err, DeskError::InvalidParams(_)));
    assert_eq!(wallet.prompt_count(), 0);
    assert_eq!(chain.call_count(), 0);

    params.transfer_fee = Some(TransferFee {
        basis_points: 100,
        receiver: Some(RECIPIENT),
    });
    creator.create_fungible(&params, &upload).await.unwrap();
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test]
async fn grouped_core_asset_is_found_by_id() {
    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let owner = wallet.address().unwrap();
    *chain.records.lock().unwrap() = vec![record(serde_json::json!({
        "id": MINT.to_string(),
        "interface": "MplCoreAsset",
        "ownership": { "owner": owner.to_string() },
        "grouping": [{ "group_key": "collection", "group_value": COLLECTION.to_string() }],
    }))];

    let catalog = AssetCatalog::new(session(&chain, &wallet));
    let asset = catalog.asset(&MINT).await.unwrap();
    assert_eq!(asset.kind, AssetKind::CoreNft { owner });
    assert_eq!(asset.collection, Some(CollectionRef(COLLECTION)));

    // and the collection-aware burn is reachable from the lookup
    let dispatcher = OperationDispatcher::new(session(&chain, &wallet));
    dispatcher.burn(&asset, None).await.unwrap();
    assert_eq!(instruction_accounts(&chain.sent()[0], 0)[1], COLLECTION);
}

#[tokio::test]
async fn collections_are_listed_by_update_authority() {
    use asset_programs::mpl_core::{CollectionV1, KEY_COLLECTION_V1};

    let chain = FakeChain::new();
    let wallet = FakeWallet::connected(1);
    let authority = wallet.address().unwrap();

    let collection_data = |update_authority: Address, name: &str| {
        let mut data = vec![KEY_COLLECTION_V1];
        data.extend(
            borsh::to_vec(&CollectionV1 {
                update_authority,
                name: name.into(),
                uri: format!("https://gateway.test/ipfs/{name}"),
                num_minted: 2,
                current_size: 1,
            })
            .unwrap(),
        );
        data
    };
    chain.insert_account(COLLECTION, MPL_CORE_PROGRAM_ID, collection_data(authority, "Mine"));
    chain.insert_account(
        Address::new([0x61; 32]),
        MPL_CORE_PROGRAM_ID,
        collection_data(RECIPIENT, "Theirs"),
    );
    // a core asset account with the same authority bytes is not a collection
    let mut asset_data = collection_data(authority, "Asset");
    asset_data[0] = 1;
    chain.insert_account(Address::new([0x62; 32]), MPL_CORE_PROGRAM_ID, asset_data);

    let catalog = AssetCatalog::new(session(&chain, &wallet));
    let collections = catalog.collections_by_authority(&authority).await.unwrap();

    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].address, COLLECTION);
    assert_eq!(collections[0].state.name, "Mine");
    assert_eq!(collections[0].state.current_size, 1);
}
