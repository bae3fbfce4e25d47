//! Results export: a pure report builder over candidates and receipts, and
//! its serialisation into the three-sheet spreadsheet the committee hands to
//! the faculty.

use std::collections::HashMap;
use std::io::Cursor;

use chrono::{DateTime, Utc};
use mongodb::{bson::doc, error::Error as DbError, options::FindOptions};
use rocket::{
    futures::TryStreamExt,
    http::{ContentType, Header},
    response::{self, Responder},
    Request, Response,
};
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::model::{
    db::{Account, Candidate, Receipt},
    mongodb::Coll,
};

/// One candidate line on the summary sheet.
#[derive(Debug, PartialEq, Eq)]
pub struct SummaryRow {
    pub number: u32,
    pub name: String,
    pub votes: u64,
    /// Two-decimal percentage of the total vote, `"0.00"` when no votes
    /// have been cast at all.
    pub percentage: String,
}

/// One receipt line on the detail sheet.
#[derive(Debug)]
pub struct DetailRow {
    pub voter_name: String,
    pub voter_username: String,
    pub candidate_name: String,
    pub candidate_number: u32,
    pub cast_at: DateTime<Utc>,
}

/// One candidate line on the info sheet.
#[derive(Debug)]
pub struct InfoRow {
    pub number: u32,
    pub name: String,
    pub vision: String,
    pub mission: String,
    pub votes: u64,
}

/// The full election report, assembled in memory before serialisation.
pub struct Report {
    pub org_name: String,
    pub subtitle: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Vec<SummaryRow>,
    pub details: Vec<DetailRow>,
    pub info: Vec<InfoRow>,
    pub total_votes: u64,
}

impl Report {
    /// Assemble a report from already-loaded data. Candidates may arrive in
    /// any order; sheets are always ordered by ballot number, details by
    /// cast time (the caller's ordering is preserved).
    pub fn build(
        org_name: String,
        subtitle: String,
        generated_at: DateTime<Utc>,
        mut candidates: Vec<Candidate>,
        details: Vec<DetailRow>,
    ) -> Self {
        candidates.sort_by_key(|c| c.number);
        let total_votes: u64 = candidates.iter().map(|c| c.votes).sum();

        let summary = candidates
            .iter()
            .map(|c| SummaryRow {
                number: c.number,
                name: c.name.clone(),
                votes: c.votes,
                percentage: percentage(c.votes, total_votes),
            })
            .collect();
        let info = candidates
            .iter()
            .map(|c| InfoRow {
                number: c.number,
                name: c.name.clone(),
                vision: c.vision.clone(),
                mission: c.mission.clone(),
                votes: c.votes,
            })
            .collect();

        Self {
            org_name,
            subtitle,
            generated_at,
            summary,
            details,
            info,
            total_votes,
        }
    }

    /// Load everything the report needs from the database. Receipts whose
    /// account or candidate has vanished mid-export are skipped; cascade
    /// deletion makes that window very small.
    pub async fn load(
        org_name: String,
        subtitle: String,
        accounts: &Coll<Account>,
        candidates: &Coll<Candidate>,
        receipts: &Coll<Receipt>,
    ) -> Result<Self, DbError> {
        let by_number = FindOptions::builder().sort(doc! { "number": 1 }).build();
        let all_candidates: Vec<Candidate> = candidates
            .find(None, by_number)
            .await?
            .try_collect()
            .await?;

        let by_cast_time = FindOptions::builder().sort(doc! { "cast_at": 1 }).build();
        let all_receipts: Vec<Receipt> = receipts
            .find(None, by_cast_time)
            .await?
            .try_collect()
            .await?;

        let all_accounts: Vec<Account> = accounts.find(None, None).await?.try_collect().await?;
        let accounts_by_id: HashMap<_, _> = all_accounts.iter().map(|a| (a.id, a)).collect();
        let candidates_by_id: HashMap<_, _> =
            all_candidates.iter().map(|c| (c.id, c)).collect();

        let details = all_receipts
            .iter()
            .filter_map(|receipt| {
                let account = accounts_by_id.get(&receipt.account_id)?;
                let candidate = candidates_by_id.get(&receipt.candidate_id)?;
                Some(DetailRow {
                    voter_name: account.name.clone(),
                    voter_username: account.username.clone(),
                    candidate_name: candidate.name.clone(),
                    candidate_number: candidate.number,
                    cast_at: receipt.cast_at,
                })
            })
            .collect();

        Ok(Self::build(
            org_name,
            subtitle,
            Utc::now(),
            all_candidates,
            details,
        ))
    }

    /// The attachment filename, e.g. `Laporan_Pemira_BEM_2026-08-27_14-03-59.xlsx`.
    pub fn filename(&self) -> String {
        format!(
            "Laporan_Pemira_BEM_{}.xlsx",
            self.generated_at.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    /// Serialise the report into xlsx bytes.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let date = self.generated_at.format("%d/%m/%Y").to_string();
        let time = self.generated_at.format("%H:%M:%S").to_string();

        // Sheet 1: summary.
        let sheet = workbook.add_worksheet();
        sheet.set_name("Ringkasan")?;
        sheet.write(0, 0, "LAPORAN HASIL PEMILIHAN KETUA BEM")?;
        sheet.write(1, 0, &self.org_name)?;
        sheet.write(2, 0, &self.subtitle)?;
        sheet.write(3, 0, "Tanggal Export:")?;
        sheet.write(3, 1, &date)?;
        sheet.write(4, 0, "Waktu Export:")?;
        sheet.write(4, 1, &time)?;
        sheet.write(6, 0, "RINGKASAN HASIL PEMILIHAN")?;
        let header_row = 8;
        for (col, title) in ["No Urut", "Nama Kandidat", "Jumlah Suara", "Persentase (%)"]
            .into_iter()
            .enumerate()
        {
            sheet.write(header_row, col as u16, title)?;
        }
        let mut row = header_row + 1;
        for line in &self.summary {
            sheet.write(row, 0, line.number)?;
            sheet.write(row, 1, &line.name)?;
            sheet.write(row, 2, line.votes)?;
            sheet.write(row, 3, &line.percentage)?;
            row += 1;
        }
        row += 1;
        sheet.write(row, 0, "TOTAL SUARA:")?;
        sheet.write(row, 1, self.total_votes)?;
        sheet.write(row + 1, 0, "TOTAL PEMILIH:")?;
        sheet.write(row + 1, 1, self.details.len() as u64)?;
        sheet.write(row + 2, 0, "TOTAL KANDIDAT:")?;
        sheet.write(row + 2, 1, self.summary.len() as u64)?;

        // Sheet 2: one row per receipt.
        let sheet = workbook.add_worksheet();
        sheet.set_name("Detail Voting")?;
        sheet.write(0, 0, "DETAIL DATA PEMILIHAN")?;
        sheet.write(1, 0, &self.org_name)?;
        sheet.write(2, 0, &self.subtitle)?;
        let header_row = 4;
        for (col, title) in [
            "No",
            "Nama Pemilih",
            "Username",
            "Kandidat Dipilih",
            "Nomor Urut",
            "Tanggal Voting",
            "Waktu Voting",
        ]
        .into_iter()
        .enumerate()
        {
            sheet.write(header_row, col as u16, title)?;
        }
        for (index, line) in self.details.iter().enumerate() {
            let row = header_row + 1 + index as u32;
            sheet.write(row, 0, (index + 1) as u64)?;
            sheet.write(row, 1, &line.voter_name)?;
            sheet.write(row, 2, &line.voter_username)?;
            sheet.write(row, 3, &line.candidate_name)?;
            sheet.write(row, 4, line.candidate_number)?;
            sheet.write(row, 5, line.cast_at.format("%d/%m/%Y").to_string())?;
            sheet.write(row, 6, line.cast_at.format("%H:%M:%S").to_string())?;
        }

        // Sheet 3: candidate info.
        let sheet = workbook.add_worksheet();
        sheet.set_name("Info Kandidat")?;
        sheet.write(0, 0, "INFORMASI KANDIDAT")?;
        sheet.write(1, 0, &self.org_name)?;
        sheet.write(2, 0, &self.subtitle)?;
        let header_row = 4;
        for (col, title) in ["No Urut", "Nama Kandidat", "Visi", "Misi", "Jumlah Suara"]
            .into_iter()
            .enumerate()
        {
            sheet.write(header_row, col as u16, title)?;
        }
        for (index, line) in self.info.iter().enumerate() {
            let row = header_row + 1 + index as u32;
            sheet.write(row, 0, line.number)?;
            sheet.write(row, 1, &line.name)?;
            sheet.write(row, 2, &line.vision)?;
            sheet.write(row, 3, &line.mission)?;
            sheet.write(row, 4, line.votes)?;
        }

        workbook.save_to_buffer()
    }
}

/// `votes / total * 100` with two decimals; `"0.00"` when total is zero.
fn percentage(votes: u64, total: u64) -> String {
    if total == 0 {
        "0.00".to_string()
    } else {
        format!("{:.2}", votes as f64 / total as f64 * 100.0)
    }
}

/// A spreadsheet download: xlsx bytes served as an attachment.
pub struct XlsxDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl<'r> Responder<'r, 'static> for XlsxDownload {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::new(
                "application",
                "vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ))
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ))
            .sized_body(self.bytes.len(), Cursor::new(self.bytes))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::model::db::CandidateCore;
    use crate::model::mongodb::Id;

    fn candidate(number: u32, name: &str, votes: u64) -> Candidate {
        let mut core = CandidateCore::new(number, name, "Visi", "Misi", None);
        core.votes = votes;
        Candidate {
            id: Id::new(),
            candidate: core,
        }
    }

    fn report(candidates: Vec<Candidate>, details: Vec<DetailRow>) -> Report {
        let generated_at = Utc.with_ymd_and_hms(2026, 8, 27, 14, 3, 59).unwrap();
        Report::build(
            "BEM".to_string(),
            "Periode 2026/2027".to_string(),
            generated_at,
            candidates,
            details,
        )
    }

    #[test]
    fn percentages_sum_to_the_expected_split() {
        let report = report(
            vec![
                candidate(2, "Paslon 2", 1),
                candidate(1, "Paslon 1", 3),
            ],
            Vec::new(),
        );

        // Sorted by ballot number regardless of input order.
        assert_eq!(report.summary[0].number, 1);
        assert_eq!(report.summary[0].percentage, "75.00");
        assert_eq!(report.summary[1].percentage, "25.00");
        assert_eq!(report.total_votes, 4);
    }

    #[test]
    fn zero_votes_reports_zero_percent_everywhere() {
        let report = report(
            vec![candidate(1, "Paslon 1", 0), candidate(2, "Paslon 2", 0)],
            Vec::new(),
        );

        assert!(report.summary.iter().all(|r| r.percentage == "0.00"));
        assert_eq!(report.total_votes, 0);
        assert!(report.details.is_empty());
    }

    #[test]
    fn filename_embeds_date_and_time() {
        let report = report(Vec::new(), Vec::new());
        assert_eq!(
            report.filename(),
            "Laporan_Pemira_BEM_2026-08-27_14-03-59.xlsx"
        );
    }

    #[test]
    fn empty_report_serialises() {
        let report = report(Vec::new(), Vec::new());
        let bytes = report.to_xlsx().unwrap();
        // Non-empty zip container even with no data rows.
        assert!(!bytes.is_empty());
    }

    #[test]
    fn rounding_is_two_decimals() {
        assert_eq!(percentage(1, 3), "33.33");
        assert_eq!(percentage(2, 3), "66.67");
        assert_eq!(percentage(0, 0), "0.00");
        assert_eq!(percentage(5, 5), "100.00");
    }
}
