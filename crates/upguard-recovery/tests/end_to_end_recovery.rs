use assert_matches::assert_matches;
use upguard_core::{secret_commitment, PermissionSet, RecoveryError};
use upguard_recovery::{RecoveryCoordinator, RecoveryStatus, VaultHandle};
use upguard_testkit::{address, guardians, init_test_tracing, test_config, ProfileFixture};

#[tokio::test]
async fn full_recovery_flow() {
    init_test_tracing();
    let fixture = ProfileFixture::new();
    let coordinator = RecoveryCoordinator::new(fixture.ledger.clone(), test_config());
    let owner = fixture.owner;
    let account = fixture.account;

    // Vault deployment, gated on ADDPERMISSIONS
    assert!(coordinator
        .can_create_recovery_vault(&owner.to_string(), &account.to_string())
        .await
        .unwrap());
    let receipt = coordinator.create_recovery_vault(account, owner).await.unwrap();
    let handle = VaultHandle::from_deployment(&receipt, account).expect("vault address");
    assert_eq!(coordinator.get_account(handle.vault).await.unwrap(), account);

    // The vault needs ADDPERMISSIONS to hand the account over later
    coordinator
        .permissions()
        .grant_add_permissions(owner, handle.vault, account)
        .await
        .unwrap();

    // Guardians, threshold, secret
    let guardians = guardians(3);
    for guardian in &guardians {
        coordinator.add_guardian(&handle, *guardian, owner).await.unwrap();
    }
    coordinator.set_threshold(&handle, 2, owner).await.unwrap();
    coordinator
        .set_secret(&handle, "correct horse", owner)
        .await
        .unwrap();
    assert_eq!(coordinator.get_guardians(handle.vault).await.unwrap(), guardians);
    assert_eq!(
        coordinator.get_guardians_threshold(handle.vault).await.unwrap(),
        2
    );

    // Votes
    let new_owner = address(0x77);
    for guardian in &guardians[..2] {
        coordinator
            .vote_to_recover(&handle, "lost-device", new_owner, *guardian)
            .await
            .unwrap();
    }
    let snapshot = coordinator
        .vote_snapshot(handle.vault, "lost-device")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.status(), RecoveryStatus::ThresholdReached);
    assert!(coordinator
        .can_recover(handle.vault, "lost-device", &new_owner.to_lowercase_hex())
        .await
        .unwrap());

    // A wrong secret reverts during estimation
    let err = coordinator
        .recover_ownership(&handle, "lost-device", "wrong", "next secret", new_owner)
        .await
        .unwrap_err();
    assert_matches!(err, RecoveryError::GasEstimation { .. });

    // Recovery
    let receipt = coordinator
        .recover_ownership(&handle, "lost-device", "correct horse", "next secret", new_owner)
        .await
        .unwrap();
    assert!(receipt.success);

    assert_eq!(
        fixture.ledger.permissions(account, new_owner),
        PermissionSet::all()
    );
    assert!(fixture.ledger.controllers(account).contains(&new_owner));
    assert!(coordinator
        .permissions()
        .can_add_permissions(&new_owner.to_string(), &account.to_string())
        .await
        .unwrap());

    let vault = fixture.ledger.vault_state(handle.vault).unwrap();
    assert_eq!(vault.secret_hash, secret_commitment("next secret"));
    assert_eq!(vault.recoveries, 1);
    assert!(coordinator
        .get_recover_processes_ids(handle.vault)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        coordinator
            .get_total_votes(handle.vault, "lost-device")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn candidate_below_threshold_cannot_recover() {
    let fixture = ProfileFixture::new();
    let coordinator = RecoveryCoordinator::new(fixture.ledger.clone(), test_config());
    let vault = fixture.ledger.deploy_vault(fixture.account);
    let handle = VaultHandle::new(vault, fixture.account);
    let guardians = guardians(3);
    fixture.ledger.set_guardians(vault, guardians.clone());
    fixture.ledger.set_threshold(vault, 2);

    let new_owner = address(0x78);
    coordinator
        .vote_to_recover(&handle, "p", new_owner, guardians[0])
        .await
        .unwrap();

    let err = coordinator
        .recover_ownership(&handle, "p", "", "next", new_owner)
        .await
        .unwrap_err();
    assert_matches!(err, RecoveryError::GasEstimation { .. });
    assert!(fixture.ledger.permissions(fixture.account, new_owner).is_empty());
}
