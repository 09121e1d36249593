use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Capabilities an anchor declares.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContentFlags(u8);

impl ContentFlags {
    pub const NONE: Self = Self(0);
    /// Emits light of its own.
    pub const EMISSIVE: Self = Self(1 << 0);
    /// Reflects light from emissive anchors.
    pub const REFLECTIVE: Self = Self(1 << 1);
    /// Groups child anchors; not drawn itself.
    pub const SYSTEM: Self = Self(1 << 2);
    /// Has no physical extent; never placed in a depth region.
    pub const VIRTUAL: Self = Self(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for ContentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for ContentFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOrAssign for ContentFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ContentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::EMISSIVE, "EMISSIVE"),
            (Self::REFLECTIVE, "REFLECTIVE"),
            (Self::SYSTEM, "SYSTEM"),
            (Self::VIRTUAL, "VIRTUAL"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ContentFlags({})", set.join(" | "))
    }
}
