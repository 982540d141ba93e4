use phf::{Map, Set, phf_map, phf_set};

pub(crate) const MAX_ATOMIC_NUMBER: u8 = 86;

static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8,
    "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15,
    "S" => 16, "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22,
    "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29,
    "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43,
    "Ru" => 44, "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50,
    "Sb" => 51, "Te" => 52, "I" => 53, "Xe" => 54, "Cs" => 55, "Ba" => 56, "La" => 57,
    "Ce" => 58, "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62, "Eu" => 63, "Gd" => 64,
    "Tb" => 65, "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70, "Lu" => 71,
    "Hf" => 72, "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78,
    "Au" => 79, "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85,
    "Rn" => 86,
};

// Donor heavy atoms and acceptors considered for hydrogen-bond topology.
static HBOND_PARTICIPANTS: Set<&'static str> = phf_set! { "N", "O", "F" };

const SYMBOLS: [&str; MAX_ATOMIC_NUMBER as usize] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn",
];

// Standard atomic weights in amu.
const MASSES: [f64; MAX_ATOMIC_NUMBER as usize] = [
    1.008, 4.0026, 6.94, 9.0122, 10.81, 12.011, 14.007, 15.999, 18.998, 20.180, 22.990, 24.305,
    26.982, 28.085, 30.974, 32.06, 35.45, 39.948, 39.098, 40.078, 44.956, 47.867, 50.942, 51.996,
    54.938, 55.845, 58.933, 58.693, 63.546, 65.38, 69.723, 72.630, 74.922, 78.971, 79.904, 83.798,
    85.468, 87.62, 88.906, 91.224, 92.906, 95.95, 98.0, 101.07, 102.91, 106.42, 107.87, 112.41,
    114.82, 118.71, 121.76, 127.60, 126.90, 131.29, 132.91, 137.33, 138.91, 140.12, 140.91,
    144.24, 145.0, 150.36, 151.96, 157.25, 158.93, 162.50, 164.93, 167.26, 168.93, 173.05,
    174.97, 178.49, 180.95, 183.84, 186.21, 190.23, 192.22, 195.08, 196.97, 200.59, 204.38,
    207.2, 208.98, 209.0, 210.0, 222.0,
];

// Single-bond covalent radii in Angstroms (Cordero et al., 2008).
const COVALENT_RADII: [f64; MAX_ATOMIC_NUMBER as usize] = [
    0.31, 0.28, 1.28, 0.96, 0.84, 0.76, 0.71, 0.66, 0.57, 0.58, 1.66, 1.41, 1.21, 1.11, 1.07,
    1.05, 1.02, 1.06, 2.03, 1.76, 1.70, 1.60, 1.53, 1.39, 1.39, 1.32, 1.26, 1.24, 1.32, 1.22,
    1.22, 1.20, 1.19, 1.20, 1.20, 1.16, 2.20, 1.95, 1.90, 1.75, 1.64, 1.54, 1.47, 1.46, 1.42,
    1.39, 1.45, 1.44, 1.42, 1.39, 1.39, 1.38, 1.39, 1.40, 2.44, 2.15, 2.07, 2.04, 2.03, 2.01,
    1.99, 1.98, 1.98, 1.96, 1.94, 1.92, 1.92, 1.89, 1.90, 1.87, 1.87, 1.75, 1.70, 1.62, 1.51,
    1.44, 1.41, 1.36, 1.36, 1.32, 1.45, 1.46, 1.48, 1.40, 1.50, 1.50,
];

/// Normalizes an element label (`"cl"`, `"CL"`, `" Cl "`) and returns its atomic number.
pub fn atomic_number_for_symbol(symbol: &str) -> Option<u8> {
    let trimmed = symbol.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let canonical: String = std::iter::once(first)
        .chain(chars.map(|c| c.to_ascii_lowercase()))
        .collect();
    ATOMIC_NUMBERS.get(canonical.as_str()).copied()
}

pub fn symbol_for(atomic_number: u8) -> Option<&'static str> {
    table_index(atomic_number).map(|i| SYMBOLS[i])
}

pub fn mass_for(atomic_number: u8) -> Option<f64> {
    table_index(atomic_number).map(|i| MASSES[i])
}

pub fn covalent_radius_for(atomic_number: u8) -> Option<f64> {
    table_index(atomic_number).map(|i| COVALENT_RADII[i])
}

pub fn is_hbond_participant(symbol: &str) -> bool {
    HBOND_PARTICIPANTS.contains(symbol)
}

fn table_index(atomic_number: u8) -> Option<usize> {
    (1..=MAX_ATOMIC_NUMBER)
        .contains(&atomic_number)
        .then(|| atomic_number as usize - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_lookup_is_case_insensitive() {
        assert_eq!(atomic_number_for_symbol("C"), Some(6));
        assert_eq!(atomic_number_for_symbol("cl"), Some(17));
        assert_eq!(atomic_number_for_symbol("CL"), Some(17));
        assert_eq!(atomic_number_for_symbol("  Rn "), Some(86));
    }

    #[test]
    fn unknown_symbols_are_rejected() {
        assert_eq!(atomic_number_for_symbol("Xx"), None);
        assert_eq!(atomic_number_for_symbol(""), None);
        assert_eq!(atomic_number_for_symbol("Og"), None);
    }

    #[test]
    fn tables_are_consistent_with_symbol_map() {
        for z in 1..=MAX_ATOMIC_NUMBER {
            let symbol = symbol_for(z).unwrap();
            assert_eq!(atomic_number_for_symbol(symbol), Some(z));
            assert!(mass_for(z).unwrap() > 0.0);
            assert!(covalent_radius_for(z).unwrap() > 0.0);
        }
    }

    #[test]
    fn out_of_range_numbers_return_none() {
        assert_eq!(symbol_for(0), None);
        assert_eq!(mass_for(87), None);
        assert_eq!(covalent_radius_for(200), None);
    }

    #[test]
    fn hbond_participants_are_electronegative_heavy_atoms() {
        assert!(is_hbond_participant("N"));
        assert!(is_hbond_participant("O"));
        assert!(!is_hbond_participant("C"));
        assert!(!is_hbond_participant("H"));
    }
}
