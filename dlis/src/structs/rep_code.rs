use std::fmt::Display;

/// Encoded width of a representation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Fixed(usize),
    /// Length-prefixed or prefix-bit encoded scalar.
    Variable,
    /// Composite of several variable reads.
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RepCode {
    Fshort = 1,
    Fsingl = 2,
    Fsing1 = 3,
    Fsing2 = 4,
    Isingl = 5,
    Vsingl = 6,
    Fdoubl = 7,
    Fdoub1 = 8,
    Fdoub2 = 9,
    Csingl = 10,
    Cdoubl = 11,
    Sshort = 12,
    Snorm = 13,
    Slong = 14,
    Ushort = 15,
    Unorm = 16,
    Ulong = 17,
    Uvari = 18,
    Ident = 19,
    Ascii = 20,
    Dtime = 21,
    Origin = 22,
    Obname = 23,
    Objref = 24,
    Attref = 25,
    Status = 26,
    Units = 27,
}

impl RepCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        use RepCode::*;
        Some(match code {
            1 => Fshort,
            2 => Fsingl,
            3 => Fsing1,
            4 => Fsing2,
            5 => Isingl,
            6 => Vsingl,
            7 => Fdoubl,
            8 => Fdoub1,
            9 => Fdoub2,
            10 => Csingl,
            11 => Cdoubl,
            12 => Sshort,
            13 => Snorm,
            14 => Slong,
            15 => Ushort,
            16 => Unorm,
            17 => Ulong,
            18 => Uvari,
            19 => Ident,
            20 => Ascii,
            21 => Dtime,
            22 => Origin,
            23 => Obname,
            24 => Objref,
            25 => Attref,
            26 => Status,
            27 => Units,
            _ => return None,
        })
    }

    pub const fn width(self) -> Width {
        use RepCode::*;
        match self {
            Sshort | Ushort | Status => Width::Fixed(1),
            Fshort | Snorm | Unorm => Width::Fixed(2),
            Fsingl | Isingl | Vsingl | Slong | Ulong => Width::Fixed(4),
            Fsing1 | Fdoubl | Csingl | Dtime => Width::Fixed(8),
            Fsing2 => Width::Fixed(12),
            Fdoub1 | Cdoubl => Width::Fixed(16),
            Fdoub2 => Width::Fixed(24),
            Uvari | Ident | Ascii | Origin | Units => Width::Variable,
            Obname | Objref | Attref => Width::Complex,
        }
    }

    pub const fn fixed_size(self) -> Option<usize> {
        match self.width() {
            Width::Fixed(size) => Some(size),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        use RepCode::*;
        match self {
            Fshort => "FSHORT",
            Fsingl => "FSINGL",
            Fsing1 => "FSING1",
            Fsing2 => "FSING2",
            Isingl => "ISINGL",
            Vsingl => "VSINGL",
            Fdoubl => "FDOUBL",
            Fdoub1 => "FDOUB1",
            Fdoub2 => "FDOUB2",
            Csingl => "CSINGL",
            Cdoubl => "CDOUBL",
            Sshort => "SSHORT",
            Snorm => "SNORM",
            Slong => "SLONG",
            Ushort => "USHORT",
            Unorm => "UNORM",
            Ulong => "ULONG",
            Uvari => "UVARI",
            Ident => "IDENT",
            Ascii => "ASCII",
            Dtime => "DTIME",
            Origin => "ORIGIN",
            Obname => "OBNAME",
            Objref => "OBJREF",
            Attref => "ATTREF",
            Status => "STATUS",
            Units => "UNITS",
        }
    }
}

impl Display for RepCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[test]
fn test_rep_code_table() {
    let sizes: Vec<Width> = (1..=27)
        .map(|code| RepCode::from_u8(code).unwrap().width())
        .collect();

    use Width::*;
    assert_eq!(
        sizes,
        [
            Fixed(2),
            Fixed(4),
            Fixed(8),
            Fixed(12),
            Fixed(4),
            Fixed(4),
            Fixed(8),
            Fixed(16),
            Fixed(24),
            Fixed(8),
            Fixed(16),
            Fixed(1),
            Fixed(2),
            Fixed(4),
            Fixed(1),
            Fixed(2),
            Fixed(4),
            Variable,
            Variable,
            Variable,
            Fixed(8),
            Variable,
            Complex,
            Complex,
            Complex,
            Fixed(1),
            Variable,
        ]
    );

    assert_eq!(RepCode::from_u8(0), None);
    assert_eq!(RepCode::from_u8(28), None);
    assert_eq!(RepCode::Fdoubl as u8, 7);
}
