use bitflags::bitflags;

bitflags! {
    /// Opaque role bit flags returned by the external Role Registry
    /// (§6). A single account may hold more than one role at once.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RoleBits: u8 {
        const WORKER   = 0b001;
        const VERIFIER = 0b010;
        const CLIENT   = 0b100;
    }
}

impl RoleBits {
    pub fn has_worker(&self) -> bool {
        self.contains(RoleBits::WORKER)
    }

    pub fn has_verifier(&self) -> bool {
        self.contains(RoleBits::VERIFIER)
    }

    pub fn has_client(&self) -> bool {
        self.contains(RoleBits::CLIENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_combine_as_bit_flags() {
        let both = RoleBits::WORKER | RoleBits::VERIFIER;
        assert!(both.has_worker());
        assert!(both.has_verifier());
        assert!(!both.has_client());
    }
}
