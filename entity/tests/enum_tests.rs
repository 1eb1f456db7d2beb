/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for entity enums

use entity::*;
use std::str::FromStr;

#[test]
fn test_build_phase_from_str() {
    assert_eq!(
        build::BuildPhase::from_str("STARTED").unwrap(),
        build::BuildPhase::Started
    );
    assert_eq!(
        build::BuildPhase::from_str("COMPLETED").unwrap(),
        build::BuildPhase::Completed
    );
    assert_eq!(
        build::BuildPhase::from_str("FINALIZED").unwrap(),
        build::BuildPhase::Finalized
    );
    assert_eq!(
        build::BuildPhase::from_str("finalized").unwrap(),
        build::BuildPhase::Finalized
    );

    assert!(build::BuildPhase::from_str("QUEUED").is_err());
}

#[test]
fn test_legacy_finished_phase_is_finalized() {
    let phase = build::BuildPhase::from_str("FINISHED").unwrap();

    assert_eq!(phase, build::BuildPhase::Finalized);
    assert!(phase.is_terminal());
    assert_eq!(phase.to_string(), "FINALIZED");
}

#[test]
fn test_only_finalized_is_terminal() {
    assert!(!build::BuildPhase::Unknown.is_terminal());
    assert!(!build::BuildPhase::Started.is_terminal());
    assert!(!build::BuildPhase::Completed.is_terminal());
    assert!(build::BuildPhase::Finalized.is_terminal());
}

#[test]
fn test_archive_policy_from_str() {
    assert_eq!(
        archive::ArchivePolicy::from_str("default").unwrap(),
        archive::ArchivePolicy::Default
    );
    assert_eq!(
        archive::ArchivePolicy::from_str("structured").unwrap(),
        archive::ArchivePolicy::Structured
    );
    assert_eq!(
        archive::ArchivePolicy::from_str("cdimage").unwrap(),
        archive::ArchivePolicy::Structured
    );

    assert!(archive::ArchivePolicy::from_str("flat").is_err());
}

#[test]
fn test_archive_transport_from_str() {
    assert_eq!(
        archive::ArchiveTransport::from_str("ssh").unwrap(),
        archive::ArchiveTransport::Ssh
    );
    assert_eq!(
        archive::ArchiveTransport::from_str("local").unwrap(),
        archive::ArchiveTransport::Local
    );

    assert!(archive::ArchiveTransport::from_str("s3").is_err());
}
