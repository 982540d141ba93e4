use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::element::{Element, ParseElementError};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Unexpected end of file after line {line}: expected {expected}")]
    UnexpectedEof { line: usize, expected: &'static str },
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{value}'")]
    InvalidAtomCount { value: String },
    #[error("Invalid coordinate '{value}'")]
    InvalidFloat { value: String },
    #[error("Atom line has {found} fields, expected an element and three coordinates")]
    TooFewFields { found: usize },
    #[error(transparent)]
    Element(#[from] ParseElementError),
}

const ENERGY_KEYS: [&str; 3] = ["energy", "e", "etot"];

/// Upper bound on the atom buffer reserved up front; larger records grow as lines arrive.
const MAX_RESERVED_ATOMS: usize = 4096;

fn comment_tokens(comment: &str) -> impl Iterator<Item = &str> {
    comment
        .split(|c: char| c.is_whitespace() || matches!(c, '=' | ':' | ','))
        .filter(|token| !token.is_empty())
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|e| e.is_finite())
}

fn keyed_energy(comment: &str) -> Option<f64> {
    comment_tokens(comment)
        .zip(comment_tokens(comment).skip(1))
        .find(|(key, _)| ENERGY_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k)))
        .and_then(|(_, value)| parse_number(value))
}

/// Extracts the energy from an XYZ comment line.
///
/// A number following an `energy`, `E` or `Etot` key wins (`energy: -12.345 gnorm: ...`,
/// `E=-12.345`). Without a key, only a comment that starts with a number (`-12.345 ...`) carries
/// an energy.
pub fn parse_comment_energy(comment: &str) -> Option<f64> {
    keyed_energy(comment).or_else(|| comment_tokens(comment).next().and_then(parse_number))
}

fn comment_line(structure: &Structure) -> String {
    match structure.energy {
        None => structure.name.clone(),
        Some(energy) if parse_comment_energy(&structure.name) == Some(energy) => {
            structure.name.clone()
        }
        Some(energy) if structure.name.is_empty() => format!("{:.10}", energy),
        // A keyed value in the name would shadow a bare leading number.
        Some(energy) if keyed_energy(&structure.name).is_some() => {
            format!("energy: {:.10}  {}", energy, structure.name)
        }
        Some(energy) => format!("{:.10}  {}", energy, structure.name),
    }
}

pub struct XyzFile;

struct LineCursor<L> {
    lines: L,
    line_num: usize,
}

impl<L: Iterator<Item = io::Result<String>>> LineCursor<L> {
    fn next_line(&mut self) -> Result<Option<String>, XyzError> {
        match self.lines.next() {
            Some(line) => {
                self.line_num += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn expect_line(&mut self, expected: &'static str) -> Result<String, XyzError> {
        self.next_line()?.ok_or(XyzError::UnexpectedEof {
            line: self.line_num,
            expected,
        })
    }

    fn error(&self, kind: XyzParseErrorKind) -> XyzError {
        XyzError::Parse {
            line: self.line_num,
            kind,
        }
    }

    fn parse_atom(&self, line: &str) -> Result<Atom, XyzError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(self.error(XyzParseErrorKind::TooFewFields {
                found: fields.len(),
            }));
        }
        let element: Element = fields[0]
            .parse()
            .map_err(|e: ParseElementError| self.error(e.into()))?;
        let mut coords = [0.0; 3];
        for (slot, value) in coords.iter_mut().zip(&fields[1..4]) {
            *slot = value.parse().map_err(|_| {
                self.error(XyzParseErrorKind::InvalidFloat {
                    value: value.to_string(),
                })
            })?;
        }
        Ok(Atom::new(
            element,
            Point3::new(coords[0], coords[1], coords[2]),
        ))
    }
}

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        let mut cursor = LineCursor {
            lines: reader.lines(),
            line_num: 0,
        };
        let mut structures = Vec::new();

        while let Some(count_line) = cursor.next_line()? {
            let trimmed = count_line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let count: usize = trimmed.parse().map_err(|_| {
                cursor.error(XyzParseErrorKind::InvalidAtomCount {
                    value: trimmed.to_string(),
                })
            })?;

            let comment = cursor.expect_line("comment line")?;
            let mut atoms = Vec::with_capacity(count.min(MAX_RESERVED_ATOMS));
            for _ in 0..count {
                let line = cursor.expect_line("atom line")?;
                atoms.push(cursor.parse_atom(&line)?);
            }

            let name = comment.trim().to_string();
            let mut structure = Structure::new(atoms)
                .with_id(structures.len())
                .with_name(name.clone());
            structure.energy = parse_comment_energy(&name);
            structures.push(structure);
        }

        Ok(structures)
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error> {
        for structure in structures {
            writeln!(writer, "{}", structure.len())?;
            writeln!(writer, "{}", comment_line(structure))?;
            for atom in structure.atoms() {
                writeln!(
                    writer,
                    "{:<3} {:>16.10} {:>16.10} {:>16.10}",
                    atom.element.symbol(),
                    atom.position.x,
                    atom.position.y,
                    atom.position.z
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_RECORDS: &str = "\
3
 energy: -76.4 gnorm: 0.001
O   0.0 0.0 0.0
H   0.96 0.0 0.0
1   -0.24 0.93 0.0

3
-76.3
8   0.0 0.0 0.0
H   0.0 0.96 0.0
H   0.93 -0.24 0.0
";

    fn read(text: &str) -> Result<Vec<Structure>, XyzError> {
        XyzFile::read_from(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn reads_multiple_records_with_energies() {
        let structures = read(TWO_RECORDS).unwrap();
        assert_eq!(structures.len(), 2);
        assert_eq!(structures[0].id, 0);
        assert_eq!(structures[1].id, 1);
        assert_eq!(structures[0].energy, Some(-76.4));
        assert_eq!(structures[1].energy, Some(-76.3));
        assert_eq!(structures[0].atoms()[2].element, Element::HYDROGEN);
        assert_eq!(structures[1].atoms()[0].element, Element::OXYGEN);
    }

    #[test]
    fn comment_energy_parsing_variants() {
        assert_eq!(parse_comment_energy("  -12.5"), Some(-12.5));
        assert_eq!(parse_comment_energy("E=-3.25 converged"), Some(-3.25));
        assert_eq!(parse_comment_energy("no energy here"), None);
        assert_eq!(parse_comment_energy("conformer 7 energy: -76.4"), Some(-76.4));
        assert_eq!(parse_comment_energy("step 12 E = -40.125 gnorm 0.002"), Some(-40.125));
        assert_eq!(parse_comment_energy("conformer 7"), None);
        assert_eq!(parse_comment_energy("-76.3 conformer 7"), Some(-76.3));
    }

    #[test]
    fn keyed_name_keeps_the_structure_energy_on_write() {
        let s = Structure::new(vec![Atom::new(Element::HYDROGEN, Point3::origin())])
            .with_name("conformer 7 energy: -76.4")
            .with_energy(-80.0);
        let line = comment_line(&s);
        assert_eq!(parse_comment_energy(&line), Some(-80.0));
    }

    #[test]
    fn huge_atom_count_reports_truncation() {
        let err = read("999999999999999\ncomment\nC 0 0 0\n").unwrap_err();
        assert!(matches!(err, XyzError::UnexpectedEof { line: 3, .. }));

        let err = read("-3\ncomment\n").unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 1,
                kind: XyzParseErrorKind::InvalidAtomCount { .. }
            }
        ));
    }

    #[test]
    fn invalid_atom_count_reports_line() {
        let err = read("abc\n").unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 1,
                kind: XyzParseErrorKind::InvalidAtomCount { .. }
            }
        ));
    }

    #[test]
    fn truncated_record_is_an_error() {
        let err = read("2\ncomment\nC 0 0 0\n").unwrap_err();
        assert!(matches!(err, XyzError::UnexpectedEof { line: 3, .. }));
    }

    #[test]
    fn bad_coordinate_and_element_are_reported() {
        let err = read("1\nx\nC 0 zero 0\n").unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 3,
                kind: XyzParseErrorKind::InvalidFloat { .. }
            }
        ));
        let err = read("1\nx\nQq 0 0 0\n").unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 3,
                kind: XyzParseErrorKind::Element(_)
            }
        ));
        let err = read("1\nx\nC 0 0\n").unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                kind: XyzParseErrorKind::TooFewFields { found: 3 },
                ..
            }
        ));
    }

    #[test]
    fn write_then_read_preserves_energy_and_geometry() {
        let original = read(TWO_RECORDS).unwrap();
        let mut buffer = Vec::new();
        XyzFile::write_to(&original, &mut buffer).unwrap();
        let reread = read(std::str::from_utf8(&buffer).unwrap()).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread[0].energy, Some(-76.4));
        let d = (reread[1].atoms()[2].position - original[1].atoms()[2].position).norm();
        assert!(d < 1e-9);
    }

    #[test]
    fn energy_is_prepended_when_name_lacks_it() {
        let s = Structure::new(vec![Atom::new(Element::HYDROGEN, Point3::origin())])
            .with_name("conformer")
            .with_energy(-0.5);
        assert_eq!(comment_line(&s), "-0.5000000000  conformer");
    }

    #[test]
    fn files_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ensemble.xyz");
        let original = read(TWO_RECORDS).unwrap();
        XyzFile::write_to_path(&original, &path).unwrap();
        assert_eq!(XyzFile::read_from_path(&path).unwrap().len(), 2);
    }
}
