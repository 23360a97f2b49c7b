// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Enumerations for TradingView websocket commands and events.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Outbound commands sent by the client.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TradingViewCommand {
    /// Presents the auth token once the session is established.
    SetAuthToken,
    /// Creates a chart session.
    ChartCreateSession,
    /// Creates a quote session.
    QuoteCreateSession,
    /// Selects the fields streamed by a quote session.
    QuoteSetFields,
    /// Adds symbols to a quote session.
    QuoteAddSymbols,
    /// Marks symbols for fast updates on a quote session.
    QuoteFastSymbols,
    /// Resolves a symbol into a chart session symbol slot.
    ResolveSymbol,
    /// Creates a data series for a resolved symbol.
    CreateSeries,
    /// Points an existing data series at another resolved symbol.
    ModifySeries,
    /// Requests an additional page of history for a data series.
    RequestMoreData,
}

/// Inbound event names recognized by the client.
///
/// Any other event name is a protocol error.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TradingViewEvent {
    /// A batch of bars for one or more series.
    TimescaleUpdate,
    /// Incremental update of the latest bars.
    #[strum(serialize = "du")]
    #[serde(rename = "du")]
    DataUpdate,
    /// All requested bars for a series have been delivered.
    SeriesCompleted,
    /// A series has started loading.
    SeriesLoading,
    /// A series could not be created or modified.
    SeriesError,
    /// The timeframe of a series was confirmed.
    SeriesTimeframe,
    /// A symbol was resolved into its metadata.
    SymbolResolved,
    /// A symbol could not be resolved.
    SymbolError,
    /// Tick mark update for a chart session.
    TickmarkUpdate,
    /// Quote session data.
    #[strum(serialize = "qsd")]
    #[serde(rename = "qsd")]
    QuoteData,
    /// A quote session finished its initial snapshot for a symbol.
    QuoteCompleted,
    /// Fields available on a quote session.
    QuoteListFields,
    /// A study started loading.
    StudyLoading,
    /// A study finished loading.
    StudyCompleted,
    /// A study failed.
    StudyError,
    /// Unrecoverable server-side session error.
    CriticalError,
    /// The server rejected a command as malformed.
    ProtocolError,
}

impl TradingViewEvent {
    /// Returns whether the event reports a session-level server failure.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CriticalError | Self::ProtocolError)
    }

    /// Returns whether the event ends the loading of the current series, successfully or not.
    #[must_use]
    pub const fn is_series_end(&self) -> bool {
        matches!(
            self,
            Self::SeriesCompleted | Self::SeriesError | Self::SymbolError
        )
    }
}
