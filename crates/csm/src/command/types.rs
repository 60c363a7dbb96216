use bitflags::bitflags;

/// Transport-assigned identifier of a remote peer. The server hands the same
/// value back to a client as its client id.
pub type PeerId = u32;

/// `major.minor` of this crate. Peers with a different mod version are not
/// admitted.
pub const MOD_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR")
);

bitflags! {
    /// Optional content packs owned by the local player. Both sides of a
    /// session must own exactly the same set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DlcMask: u64 {
        const DELUXE = 1 << 0;
        const AFTER_DARK = 1 << 1;
        const SNOWFALL = 1 << 2;
        const NATURAL_DISASTERS = 1 << 3;
        const MASS_TRANSIT = 1 << 4;
        const GREEN_CITIES = 1 << 5;
        const PARKLIFE = 1 << 6;
        const INDUSTRIES = 1 << 7;
        const CAMPUS = 1 << 8;
        const SUNSET_HARBOR = 1 << 9;
        const AIRPORTS = 1 << 10;
        const PLAZAS_AND_PROMENADES = 1 << 11;
        const FINANCIAL_DISTRICTS = 1 << 12;
        const HOTELS_AND_RETREATS = 1 << 13;
    }
}

impl DlcMask {
    pub fn from_wire(bits: u64) -> Self {
        Self::from_bits_retain(bits)
    }

    fn describe(self) -> String {
        if self.is_empty() {
            return String::from("none");
        }
        let mut names: Vec<String> = self.iter_names().map(|(name, _)| name.to_owned()).collect();
        let unknown = self.bits() & !Self::all().bits();
        if unknown != 0 {
            names.push(format!("unknown({unknown:#x})"));
        }
        names.join(", ")
    }

    /// Human-readable account of which content one side has and the other
    /// lacks.
    pub fn describe_difference(self, other: DlcMask) -> String {
        let only_self = Self::from_bits_retain(self.bits() & !other.bits());
        let only_other = Self::from_bits_retain(other.bits() & !self.bits());
        format!(
            "missing locally: {}; missing on server: {}",
            only_other.describe(),
            only_self.describe()
        )
    }
}
