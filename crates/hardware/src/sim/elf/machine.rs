//! ELF machine names for diagnostics.

/// Names for `e_machine` values 0 through 63; `None` marks unassigned values.
const MACHINE_NAMES: [Option<&str>; 64] = [
    Some("NONE"),
    Some("M32"),
    Some("SPARC"),
    Some("386"),
    Some("68K"),
    Some("88K"),
    Some("486"),
    Some("860"),
    Some("MIPS"),
    Some("S370"),
    Some("MIPS_RS3_LE"),
    Some("RS6000"),
    None,
    None,
    None,
    Some("PARISC"),
    Some("NCUBE"),
    Some("VPP500"),
    Some("SPARC32PLUS"),
    Some("960"),
    Some("PPC"),
    Some("PPC64"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("V800"),
    Some("FR20"),
    Some("RH32"),
    Some("RCE"),
    Some("ARM"),
    Some("ALPHA"),
    Some("SH"),
    Some("SPARCV9"),
    Some("TRICORE"),
    Some("ARC"),
    Some("H8_300"),
    Some("H8_300H"),
    Some("H8S"),
    Some("H8_500"),
    Some("IA_64"),
    Some("MIPS_X"),
    Some("COLDFIRE"),
    Some("68HC12"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("AMD64"),
    None,
];

/// Returns a display name for an ELF machine number.
///
/// Unassigned values below 64 read `unknown<N>`; larger values read `machine type '<N>'`.
pub fn machine_name(machine: u16) -> String {
    match MACHINE_NAMES.get(usize::from(machine)) {
        Some(Some(name)) => (*name).to_owned(),
        Some(None) => format!("unknown{machine}"),
        None => format!("machine type '{machine}'"),
    }
}
