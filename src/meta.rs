//! Policy metadata attached to each resident node.
//!
//! The admission hierarchy splits resident entries into three regions. A
//! node's region only changes inside the maintenance section.
//!
//! | Region | Share of capacity | Entered by |
//! |--------|-------------------|------------|
//! | `Window` | ~1% | every new entry |
//! | `Probation` | remainder of main | window overflow, protected demotion |
//! | `Protected` | ~80% of main | a read while on probation |
//!
//! ```
//! use concurrent_lfu::meta::Region;
//!
//! assert_eq!(Region::default(), Region::Window);
//! assert!(Region::Probation.is_main());
//! ```

/// Segment of the admission hierarchy a node currently belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Region {
    /// Small admission window; new entries land here.
    #[default]
    Window,
    /// Main-space entries that have not been read since admission or demotion.
    Probation,
    /// Main-space entries that were read while on probation.
    Protected,
}

impl Region {
    /// Returns `true` for the two main-space regions.
    #[inline]
    pub fn is_main(self) -> bool {
        !matches!(self, Region::Window)
    }
}

/// Per-node bookkeeping held in the policy arena next to the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PolicyMeta {
    /// Region the node is linked into.
    pub(crate) region: Region,
    /// Expiry timestamp under which the node is filed in the expiry index,
    /// or `None` when it is not filed.
    pub(crate) filed_expiry: Option<u64>,
}

impl PolicyMeta {
    #[inline]
    pub(crate) fn new(region: Region) -> Self {
        Self {
            region,
            filed_expiry: None,
        }
    }
}
