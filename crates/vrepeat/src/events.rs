/// Manual resize notifications for hosts without native size observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VirtualizationEvent {
    /// The scroll container changed size.
    ScrollerSizeChange,
    /// A rendered item changed size.
    ItemSizeChange,
}

impl VirtualizationEvent {
    pub const ALL: [VirtualizationEvent; 2] = [
        VirtualizationEvent::ScrollerSizeChange,
        VirtualizationEvent::ItemSizeChange,
    ];

    /// Stable event name, suitable for a host event bus.
    pub const fn name(self) -> &'static str {
        match self {
            VirtualizationEvent::ScrollerSizeChange => "virtual-repeat-scroller-size-changed",
            VirtualizationEvent::ItemSizeChange => "virtual-repeat-item-size-changed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for event in VirtualizationEvent::ALL {
            assert_eq!(VirtualizationEvent::from_name(event.name()), Some(event));
        }
        assert_eq!(VirtualizationEvent::from_name("scroll"), None);
    }
}
