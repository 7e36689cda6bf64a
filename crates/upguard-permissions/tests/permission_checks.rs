use assert_matches::assert_matches;
use proptest::prelude::*;
use upguard_core::permissions::{
    array_element_key, decode_array_element, decode_array_length, encode_array_length,
    permissions_key, ADDRESS_PERMISSIONS_ARRAY_KEY,
};
use upguard_core::{LedgerError, Permission, PermissionSet, RecoveryError};
use upguard_permissions::{PermissionChecker, MAX_CONTROLLERS};
use upguard_testkit::strategies::arb_nonzero_address;
use upguard_testkit::{address, init_test_tracing, test_config, MockLedger, ProfileFixture};

fn checker(fixture: &ProfileFixture) -> PermissionChecker<MockLedger> {
    PermissionChecker::new(fixture.ledger.clone(), &test_config())
}

#[tokio::test]
async fn absent_controller_cannot_add_permissions() {
    init_test_tracing();
    let fixture = ProfileFixture::new();
    let checker = checker(&fixture);

    // Permission bits alone are not enough without a list entry.
    let unlisted = address(5);
    fixture.ledger.set_data(
        fixture.account,
        permissions_key(&unlisted),
        PermissionSet::all().encode(),
    );

    let allowed = checker
        .can_add_permissions(&unlisted.to_string(), &fixture.account.to_string())
        .await
        .unwrap();
    assert!(!allowed);
}

#[tokio::test]
async fn listed_controller_in_either_letter_case() {
    let fixture = ProfileFixture::new();
    let checker = checker(&fixture);
    let account = fixture.account.to_string();

    let lowercase = fixture.owner.to_lowercase_hex();
    let checksummed = fixture.owner.to_checksum();
    assert!(checker.can_add_permissions(&lowercase, &account).await.unwrap());
    assert!(checker.can_add_permissions(&checksummed, &account).await.unwrap());
    assert!(checker
        .can_add_permissions(&checksummed, &fixture.account.to_lowercase_hex())
        .await
        .unwrap());
}

#[tokio::test]
async fn listed_controller_without_add_permissions() {
    let fixture = ProfileFixture::new();
    let controller = address(3);
    let mut permissions = PermissionSet::all();
    permissions.remove(Permission::AddPermissions);
    fixture
        .ledger
        .add_controller(fixture.account, controller, permissions);
    let checker = checker(&fixture);

    let allowed = checker
        .can_add_permissions(&controller.to_string(), &fixture.account.to_string())
        .await
        .unwrap();
    assert!(!allowed);
}

#[tokio::test]
async fn word_encoded_list_entry_matches_lowercase_input() {
    let fixture = ProfileFixture::new();
    let controller = address(4);

    // Element stored as a left-padded word instead of raw 20 bytes.
    let len = decode_array_length(
        &fixture
            .ledger
            .get_data(fixture.account, ADDRESS_PERMISSIONS_ARRAY_KEY),
    )
    .unwrap();
    fixture.ledger.set_data(
        fixture.account,
        array_element_key(len),
        controller.to_word().to_vec(),
    );
    fixture.ledger.set_data(
        fixture.account,
        ADDRESS_PERMISSIONS_ARRAY_KEY,
        encode_array_length(len + 1),
    );
    fixture.ledger.set_data(
        fixture.account,
        permissions_key(&controller),
        PermissionSet::only(Permission::AddPermissions).encode(),
    );

    let allowed = checker(&fixture)
        .can_add_permissions(&controller.to_lowercase_hex(), &fixture.account.to_string())
        .await
        .unwrap();
    assert!(allowed);
}

#[tokio::test]
async fn grant_appends_unlisted_beneficiary() {
    init_test_tracing();
    let fixture = ProfileFixture::new();
    let checker = checker(&fixture);
    let beneficiary = address(8);

    let receipt = checker
        .grant_add_permissions(fixture.owner, beneficiary, fixture.account)
        .await
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.to, fixture.key_manager);

    assert_eq!(
        checker.controllers(fixture.account).await.unwrap(),
        vec![fixture.owner, beneficiary]
    );
    assert_eq!(
        checker
            .permissions_of(beneficiary, fixture.account)
            .await
            .unwrap(),
        PermissionSet::only(Permission::AddPermissions)
    );
    assert!(checker
        .can_add_permissions(&beneficiary.to_string(), &fixture.account.to_string())
        .await
        .unwrap());
}

#[tokio::test]
async fn grant_appends_at_the_stored_length() {
    let fixture = ProfileFixture::new();
    fixture
        .ledger
        .add_controller(fixture.account, address(2), PermissionSet::empty());
    // Third slot holds something that is not an address
    fixture
        .ledger
        .set_data(fixture.account, array_element_key(2), vec![0xde, 0xad]);
    fixture.ledger.set_data(
        fixture.account,
        ADDRESS_PERMISSIONS_ARRAY_KEY,
        encode_array_length(3),
    );
    let beneficiary = address(8);

    checker(&fixture)
        .grant_add_permissions(fixture.owner, beneficiary, fixture.account)
        .await
        .unwrap();

    let stored = fixture
        .ledger
        .get_data(fixture.account, ADDRESS_PERMISSIONS_ARRAY_KEY);
    assert_eq!(decode_array_length(&stored).unwrap(), 4);
    let appended = fixture
        .ledger
        .get_data(fixture.account, array_element_key(3));
    assert_eq!(decode_array_element(&appended), Some(beneficiary));
}

#[tokio::test]
async fn oversized_controller_array_is_an_error() {
    for len in [u128::MAX, MAX_CONTROLLERS as u128 + 1] {
        let fixture = ProfileFixture::new();
        fixture.ledger.set_data(
            fixture.account,
            ADDRESS_PERMISSIONS_ARRAY_KEY,
            encode_array_length(len),
        );
        let checker = checker(&fixture);

        assert_matches!(
            checker
                .can_add_permissions(&address(9).to_string(), &fixture.account.to_string())
                .await,
            Err(RecoveryError::Serialization { .. })
        );
        assert_matches!(
            checker
                .grant_add_permissions(fixture.owner, address(9), fixture.account)
                .await,
            Err(RecoveryError::Serialization { .. })
        );
        assert!(fixture.ledger.sent_transactions().is_empty());
    }
}

#[tokio::test]
async fn grant_rewrites_listed_beneficiary_in_place() {
    let fixture = ProfileFixture::new();
    let beneficiary = address(9);
    fixture.ledger.add_controller(
        fixture.account,
        beneficiary,
        PermissionSet::only(Permission::SetData),
    );
    let checker = checker(&fixture);

    checker
        .grant_add_permissions(fixture.owner, beneficiary, fixture.account)
        .await
        .unwrap();

    assert_eq!(fixture.ledger.controllers(fixture.account).len(), 2);
    assert_eq!(
        fixture.ledger.permissions(fixture.account, beneficiary),
        PermissionSet::only(Permission::AddPermissions)
    );
}

#[tokio::test]
async fn grant_by_unauthorised_controller_fails_at_estimation() {
    let fixture = ProfileFixture::new();
    let weak = address(6);
    fixture
        .ledger
        .add_controller(fixture.account, weak, PermissionSet::only(Permission::Call));
    let checker = checker(&fixture);

    let err = checker
        .grant_add_permissions(weak, address(7), fixture.account)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        RecoveryError::GasEstimation {
            cause: LedgerError::Reverted { .. },
            ..
        }
    );
    assert!(fixture.ledger.sent_transactions().is_empty());
}

#[tokio::test]
async fn grant_submission_failure_is_staged() {
    let fixture = ProfileFixture::new();
    fixture
        .ledger
        .fail_next_send(LedgerError::transport("connection reset"));

    let err = checker(&fixture)
        .grant_add_permissions(fixture.owner, address(2), fixture.account)
        .await
        .unwrap_err();
    assert_matches!(err, RecoveryError::Submission { .. });
}

#[tokio::test]
async fn read_failures_propagate() {
    let fixture = ProfileFixture::new();
    fixture
        .ledger
        .fail_reads(Some(LedgerError::transport("node unavailable")));

    let err = checker(&fixture)
        .can_add_permissions(&fixture.owner.to_string(), &fixture.account.to_string())
        .await
        .unwrap_err();
    assert_matches!(err, RecoveryError::Ledger { .. });
}

fn arb_permissions() -> impl Strategy<Value = PermissionSet> {
    proptest::collection::vec(proptest::sample::select(Permission::ALL.to_vec()), 0..6)
        .prop_map(|flags| flags.into_iter().collect())
}

proptest! {
    #[test]
    fn decision_follows_add_permissions_bit(
        permissions in arb_permissions(),
        controller in arb_nonzero_address(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let fixture = ProfileFixture::new();
        prop_assume!(controller != fixture.owner);
        fixture.ledger.add_controller(fixture.account, controller, permissions);

        let allowed = runtime.block_on(
            checker(&fixture).can_add_permissions(&controller.to_string(), &fixture.account.to_string()),
        ).unwrap();
        prop_assert_eq!(allowed, permissions.contains(Permission::AddPermissions));
    }
}
