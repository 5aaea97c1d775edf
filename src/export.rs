//! Spreadsheet-safe CSV exports.

use csv::WriterBuilder;

use crate::account::{Account, Role};
use crate::classroom::Class;
use crate::security::sanitize_for_csv;

const MEMBERS_HEADERS: [&str; 4] = ["name", "email", "role", "class"];
const CLASSES_HEADERS: [&str; 4] = ["id", "name", "timetable", "updated_at"];

/// Shown instead of inlined uploads.
const UPLOADED_PLACEHOLDER: &str = "uploaded file";

fn role(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Delegate => "delegate",
        Role::Student => "student",
    }
}

fn write<const N: usize>(
    headers: [&str; N],
    rows: impl IntoIterator<Item = [Option<String>; N]>,
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(headers)?;

    for row in rows {
        writer.write_record(
            row.iter().map(|cell| sanitize_for_csv(cell.as_deref())),
        )?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// Export the members of `class`.
pub fn members_csv(class: &Class, members: &[&Account]) -> Result<Vec<u8>, csv::Error> {
    write(
        MEMBERS_HEADERS,
        members.iter().map(|account| {
            [
                Some(account.name.clone()),
                Some(account.email.clone()),
                Some(role(account.role).to_owned()),
                Some(class.name.clone()),
            ]
        }),
    )
}

/// Export every class and its timetable status.
pub fn classes_csv(classes: &[Class]) -> Result<Vec<u8>, csv::Error> {
    write(
        CLASSES_HEADERS,
        classes.iter().map(|class| {
            let timetable = class.timetable.as_ref();
            [
                Some(class.id.clone()),
                Some(class.name.clone()),
                timetable.map(|timetable| {
                    if timetable.is_data_file() {
                        UPLOADED_PLACEHOLDER.to_owned()
                    } else {
                        timetable.url.clone()
                    }
                }),
                timetable.map(|timetable| timetable.updated_at.to_rfc3339()),
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStore;
    use crate::account::tests::accounts;
    use crate::classroom::Timetable;
    use chrono::{TimeZone, Utc};

    fn class(name: &str, timetable: Option<&str>) -> Class {
        Class {
            id: "l3-info".into(),
            name: name.into(),
            timetable: timetable.map(|url| Timetable {
                url: url.into(),
                updated_at: Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap(),
            }),
        }
    }

    #[test]
    fn test_members_csv() {
        let store = AccountStore::new(accounts());
        let class = class("Licence 3 Informatique", None);
        let csv = members_csv(&class, &store.members("l3-info")).unwrap();
        let csv = String::from_utf8(csv).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "name,email,role,class");
        assert_eq!(
            lines[1],
            r#""'=HYPERLINK(""http://evil"")",etudiant@ecole.sn,student,Licence 3 Informatique"#
        );
        assert_eq!(
            lines[2],
            "Awa Diop,delegue@ecole.sn,delegate,Licence 3 Informatique"
        );
    }

    #[test]
    fn test_classes_csv() {
        let classes = [
            class("+33 Informatique", Some("https://ucad.sn/edt.pdf")),
            class("-Math", Some("data:application/pdf;base64,JVBERg==")),
            class("@Physique", None),
        ];
        let csv = String::from_utf8(classes_csv(&classes).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "id,name,timetable,updated_at");
        assert_eq!(
            lines[1],
            "l3-info,'+33 Informatique,https://ucad.sn/edt.pdf,2025-09-01T08:00:00+00:00"
        );
        assert_eq!(
            lines[2],
            "l3-info,'-Math,uploaded file,2025-09-01T08:00:00+00:00"
        );
        assert_eq!(lines[3], "l3-info,'@Physique,,");
    }
}
