/// The tier a tip is held in inside the tip pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TipTier {
    /// Fresh tips, preferred for selection.
    NonLazy,
    /// Tips directly referencing a stale part of the DAG, used as a fallback.
    SemiLazy,
}

/// The freshness class of a candidate tip.
///
/// [`TipClass::Lazy`] tips must never be selected and are not admitted to
/// the pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TipClass {
    NonLazy,
    SemiLazy,
    Lazy,
}

impl TipClass {
    /// The pool tier this class maps to, if it is selectable at all.
    pub const fn tier(self) -> Option<TipTier> {
        match self {
            Self::NonLazy => Some(TipTier::NonLazy),
            Self::SemiLazy => Some(TipTier::SemiLazy),
            Self::Lazy => None,
        }
    }

    /// Whether a tip of this class may still be served from the given tier.
    ///
    /// A pick from the non-lazy tier must still classify non-lazy; a pick
    /// from the semi-lazy tier may classify either non-lazy or semi-lazy.
    pub const fn within(self, tier: TipTier) -> bool {
        match (self, tier) {
            (Self::NonLazy, _) | (Self::SemiLazy, TipTier::SemiLazy) => true,
            (Self::SemiLazy, TipTier::NonLazy) | (Self::Lazy, _) => false,
        }
    }
}
