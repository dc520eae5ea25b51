// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Queued donation mutations.
//!
//! An [`Operation`] is built by a request handler, owned by the
//! [`OperationQueue`](crate::OperationQueue) until dequeued, then owned by the
//! [`QueueWorker`](crate::QueueWorker) for a single application attempt.

use crate::base::DonationId;
use crate::donation::Donation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A donation mutation waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "donation", rename_all = "lowercase")]
pub enum Operation {
    /// Insert the donation and move its amount from the account to the campaign.
    Create(Donation),
    /// Remove the donation and move its amount back to the account.
    Delete(Donation),
}

/// Which mutation an [`Operation`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

impl Operation {
    pub fn new(kind: OperationKind, donation: Donation) -> Self {
        match kind {
            OperationKind::Create => Self::Create(donation),
            OperationKind::Delete => Self::Delete(donation),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Delete(_) => OperationKind::Delete,
        }
    }

    pub fn donation(&self) -> &Donation {
        match self {
            Self::Create(donation) | Self::Delete(donation) => donation,
        }
    }

    pub fn donation_id(&self) -> DonationId {
        self.donation().id
    }
}
