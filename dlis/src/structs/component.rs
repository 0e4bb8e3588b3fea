use crate::utils::errors::ComponentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    AbsentAttribute,
    Attribute,
    InvariantAttribute,
    Object,
    RedundantSet,
    ReplacementSet,
    Set,
}

impl Role {
    pub fn is_set(self) -> bool {
        matches!(self, Role::Set | Role::RedundantSet | Role::ReplacementSet)
    }

    pub fn is_attribute(self) -> bool {
        matches!(
            self,
            Role::AbsentAttribute | Role::Attribute | Role::InvariantAttribute
        )
    }
}

/// Component descriptor byte.
///
/// The top three bits select the role. The low five bits are format flags,
/// kept reflected the same way as segment attributes (the whole byte is
/// bit-reversed), so the flag constants below are the reversed wire bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub role: Role,
    pub format: u8,
}

impl ComponentDescriptor {
    // Set: wire 0x10 type, 0x08 name.
    pub const SET_TYPE: u8 = 0x08;
    pub const SET_NAME: u8 = 0x10;

    // Object: wire 0x10 name.
    pub const OBJECT_NAME: u8 = 0x08;

    // Attribute: wire 0x10 label, 0x08 count, 0x04 code, 0x02 units, 0x01 value.
    pub const ATTR_LABEL: u8 = 0x08;
    pub const ATTR_COUNT: u8 = 0x10;
    pub const ATTR_REP_CODE: u8 = 0x20;
    pub const ATTR_UNITS: u8 = 0x40;
    pub const ATTR_VALUE: u8 = 0x80;

    pub fn from_byte(byte: u8) -> Result<Self, ComponentError> {
        let role = match byte >> 5 {
            0 => Role::AbsentAttribute,
            1 => Role::Attribute,
            2 => Role::InvariantAttribute,
            3 => Role::Object,
            5 => Role::RedundantSet,
            6 => Role::ReplacementSet,
            7 => Role::Set,
            _ => return Err(ComponentError::ReservedRole(byte)),
        };

        Ok(Self {
            role,
            format: (byte & 0x1F).reverse_bits(),
        })
    }

    pub fn has(&self, flag: u8) -> bool {
        self.format & flag != 0
    }
}
