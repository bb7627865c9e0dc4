use std::fs::File;
use std::io::Read;
use std::path::Path;

use actharvest_core_types::RecordIdentity;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::KernelError;

/// One dispatchable row of the backlog CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogItem {
    /// 1-based data row, for diagnostics.
    pub row: usize,
    pub identity: RecordIdentity,
}

impl BacklogItem {
    pub fn first_name(&self) -> &str {
        self.identity.primary()
    }

    pub fn last_name(&self) -> &str {
        self.identity.secondary()
    }
}

/// A profile to contact, from the persons CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonTarget {
    pub row: usize,
    /// `(person, profile_url)`.
    pub identity: RecordIdentity,
    pub company: Option<String>,
}

impl PersonTarget {
    pub fn person(&self) -> &str {
        self.identity.primary()
    }

    pub fn profile_url(&self) -> &str {
        self.identity.secondary()
    }
}

#[derive(Deserialize)]
struct BacklogRow {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct PersonRow {
    #[serde(default, rename = "ProfileUrl")]
    profile_url: Option<String>,
    #[serde(default, rename = "Person")]
    person: Option<String>,
    #[serde(default, rename = "Company")]
    company: Option<String>,
}

fn open(path: &Path) -> Result<File, KernelError> {
    File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            KernelError::precondition(format!("input file {} not found", path.display()))
        } else {
            KernelError::io(path, err)
        }
    })
}

fn backlog_error(path: &Path, source: csv::Error) -> KernelError {
    KernelError::Backlog {
        path: path.to_path_buf(),
        source,
    }
}

/// Load `first_name,last_name` rows; rows missing either field are skipped.
pub fn load_backlog(path: &Path) -> Result<Vec<BacklogItem>, KernelError> {
    let items = read_backlog(open(path)?).map_err(|err| backlog_error(path, err))?;
    info!(path = %path.display(), items = items.len(), "backlog loaded");
    Ok(items)
}

pub fn read_backlog<R: Read>(reader: R) -> Result<Vec<BacklogItem>, csv::Error> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut items = Vec::new();
    for (index, row) in csv.deserialize::<BacklogRow>().enumerate() {
        let row_number = index + 1;
        let row = row?;
        let identity = RecordIdentity::new(
            row.first_name.unwrap_or_default(),
            row.last_name.unwrap_or_default(),
        );
        match identity {
            Ok(identity) => items.push(BacklogItem {
                row: row_number,
                identity,
            }),
            Err(err) => debug!(row = row_number, %err, "skipping incomplete backlog row"),
        }
    }
    Ok(items)
}

/// Load `ProfileUrl,Person,Company` rows; rows without a person or URL are skipped.
pub fn load_persons(path: &Path) -> Result<Vec<PersonTarget>, KernelError> {
    let persons = read_persons(open(path)?).map_err(|err| backlog_error(path, err))?;
    info!(path = %path.display(), persons = persons.len(), "persons loaded");
    Ok(persons)
}

pub fn read_persons<R: Read>(reader: R) -> Result<Vec<PersonTarget>, csv::Error> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut persons = Vec::new();
    for (index, row) in csv.deserialize::<PersonRow>().enumerate() {
        let row_number = index + 1;
        let row = row?;
        let identity = RecordIdentity::new(
            row.person.unwrap_or_default(),
            row.profile_url.unwrap_or_default(),
        );
        match identity {
            Ok(identity) => persons.push(PersonTarget {
                row: row_number,
                identity,
                company: row.company.filter(|c| !c.trim().is_empty()),
            }),
            Err(err) => debug!(row = row_number, %err, "skipping incomplete person row"),
        }
    }
    Ok(persons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_rows_missing_a_name() {
        let csv = "first_name,last_name,notes\nAda,Lovelace,x\n,Hopper,y\nAlan,  ,z\n  Grace , Hopper ,\n";
        let items = read_backlog(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].first_name(), "Ada");
        assert_eq!(items[1].last_name(), "Hopper");
        assert_eq!(items[1].row, 4);
    }

    #[test]
    fn persons_use_name_and_url_as_identity() {
        let csv = "ProfileUrl,Person,Company\nhttps://p/1,Ada,Analytical\nhttps://p/2,,Nobody\n,Alan,Bletchley\n";
        let persons = read_persons(csv.as_bytes()).unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].person(), "Ada");
        assert_eq!(persons[0].profile_url(), "https://p/1");
        assert_eq!(persons[0].company.as_deref(), Some("Analytical"));
    }

    #[test]
    fn missing_file_is_a_precondition_failure() {
        let err = load_backlog(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.is_fatal_precondition());
    }
}
