/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::ops::RangeInclusive;

pub const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

pub const DEFAULT_SSH_PORT: i32 = 22;

/// Build parameter carrying the `build_key` of the requesting project build.
pub const BUILD_ID_PARAMETER: &str = "BUILD_ID";
/// Build parameter carrying the name of the requesting user.
pub const REQUESTOR_PARAMETER: &str = "REQUESTOR";

/// Checksum manifest written next to archived artifacts.
pub const CHECKSUM_FILE: &str = "SHA256SUMS";
