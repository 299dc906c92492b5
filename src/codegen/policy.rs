//! Pointer, nil-guard and default back-fill rules for object fields.
//!
//! One table per direction: given what is known about a field on each side,
//! decide whether each side holds a pointer and how the assignment reads.
use super::Direction;

/// What the engine knows about one matched field pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFacts {
    /// Both sides are primitives.
    pub primitive: bool,
    pub source_pointer_capable: bool,
    pub target_pointer_capable: bool,
    pub source_required: bool,
    pub source_has_default: bool,
    pub target_required: bool,
    pub target_has_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `tgt.F = src.F`
    Direct,
    /// `tgt.F = *src.F`
    Dereference,
    /// `tgt.F = &src.F`
    AddressOf,
    /// `if src.F != nil { tgt.F = *src.F }`
    DeferWithGuard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub source_pointer: bool,
    pub target_pointer: bool,
    pub access: Access,
    /// Wrap a non-primitive conversion in `if src.F != nil`.
    pub guard: bool,
    /// Emit `if src.F == nil { tgt.F = <default> }`.
    pub backfill: bool,
}

impl FieldFacts {
    /// Optional primitive without a default.
    fn source_optional_pointer(&self) -> bool {
        self.primitive && self.source_pointer_capable && !self.source_required && !self.source_has_default
    }

    fn target_optional_pointer(&self) -> bool {
        self.primitive && self.target_pointer_capable && !self.target_required && !self.target_has_default
    }
}

pub fn decide(direction: Direction, facts: &FieldFacts) -> Decision {
    let source_pointer = match direction {
        // transport bodies decode every primitive into a pointer so that
        // presence can be validated
        Direction::Unmarshal => facts.primitive && facts.source_pointer_capable,
        Direction::Marshal | Direction::ToProto => facts.source_optional_pointer(),
        Direction::FromProto => false,
    };
    let target_pointer = match direction {
        Direction::ToProto => false,
        _ => facts.target_optional_pointer(),
    };
    let access = match (source_pointer, target_pointer) {
        (true, false) if facts.source_required => Access::Dereference,
        (true, false) => Access::DeferWithGuard,
        (false, true) => Access::AddressOf,
        _ => Access::Direct,
    };
    let guard = !facts.primitive && (direction == Direction::Marshal || !facts.source_required);
    let backfill = facts.target_has_default && match direction {
        Direction::Unmarshal => true,
        Direction::Marshal | Direction::ToProto => source_pointer || !facts.primitive,
        Direction::FromProto => !facts.primitive,
    };
    Decision { source_pointer, target_pointer, access, guard, backfill }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optional() -> FieldFacts {
        FieldFacts {
            primitive: true,
            source_pointer_capable: true,
            target_pointer_capable: true,
            ..FieldFacts::default()
        }
    }

    #[test]
    fn marshal_optional_primitive_copies_pointer() {
        let d = decide(Direction::Marshal, &optional());
        assert!(d.source_pointer && d.target_pointer);
        assert_eq!(d.access, Access::Direct);
        assert!(!d.backfill);
    }

    #[test]
    fn marshal_backfills_only_from_pointers() {
        let both = FieldFacts { source_has_default: true, target_has_default: true, ..optional() };
        let d = decide(Direction::Marshal, &both);
        assert_eq!(d.access, Access::Direct);
        assert!(!d.backfill);
        let target_only = FieldFacts { target_has_default: true, ..optional() };
        let d = decide(Direction::Marshal, &target_only);
        assert_eq!(d.access, Access::DeferWithGuard);
        assert!(d.backfill);
    }

    #[test]
    fn unmarshal_required_dereferences() {
        let facts = FieldFacts { source_required: true, target_required: true, ..optional() };
        let d = decide(Direction::Unmarshal, &facts);
        assert_eq!(d.access, Access::Dereference);
    }

    #[test]
    fn unmarshal_default_defers_and_backfills() {
        let facts = FieldFacts { source_has_default: true, target_has_default: true, ..optional() };
        let d = decide(Direction::Unmarshal, &facts);
        assert_eq!(d.access, Access::DeferWithGuard);
        assert!(d.backfill);
    }

    #[test]
    fn to_proto_never_targets_pointers() {
        let d = decide(Direction::ToProto, &optional());
        assert!(!d.target_pointer);
        assert_eq!(d.access, Access::DeferWithGuard);
    }

    #[test]
    fn from_proto_takes_addresses() {
        let d = decide(Direction::FromProto, &optional());
        assert!(!d.source_pointer);
        assert_eq!(d.access, Access::AddressOf);
    }

    #[test]
    fn bytes_are_never_pointers() {
        let facts = FieldFacts { source_pointer_capable: false, target_pointer_capable: false, ..optional() };
        for direction in Direction::ALL {
            let d = decide(direction, &facts);
            assert_eq!(d.access, Access::Direct, "{direction}");
        }
    }

    #[test]
    fn marshal_always_guards_composites() {
        let facts = FieldFacts { source_required: true, ..FieldFacts::default() };
        assert!(decide(Direction::Marshal, &facts).guard);
        assert!(!decide(Direction::Unmarshal, &facts).guard);
        assert!(decide(Direction::ToProto, &FieldFacts::default()).guard);
    }

    #[test]
    fn composite_defaults_backfill_in_every_direction() {
        let facts = FieldFacts { target_has_default: true, ..FieldFacts::default() };
        for direction in Direction::ALL {
            assert!(decide(direction, &facts).backfill, "{direction}");
        }
    }
}
