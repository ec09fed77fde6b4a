/// The synchronization state of the node relative to its peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Downloading headers towards a peer's selected tip
    HeadersFirst,
    /// Fully within relay range; blocks arrive via inv relay
    Relay,
    /// Headers are synced past the pruning point but the pruning point
    /// UTXO set was not downloaded yet
    MissingUtxoSet,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncInfo {
    pub state: SyncState,
    pub headers_selected_tip_blue_score: u64,
    pub virtual_blue_score: u64,
}

impl SyncInfo {
    pub fn is_synced(&self) -> bool {
        matches!(self.state, SyncState::Relay)
    }
}
