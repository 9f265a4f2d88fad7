//! Hour totals and the plain-text certificate handed to students.

use std::fmt::Write;
use std::sync::Arc;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::models::{AttendanceRecord, Participation, ProjectParticipation, Role, Student};
use crate::state::AppState;
use crate::store::{Store, StoreError};
use crate::{ApiPath, Error};

const NOT_INFORMED: &str = "Não informado";
const UNKNOWN_PROJECT: &str = "Projeto não identificado";

/// Everything a report is rendered from. Also the public lookup payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: Student,
    pub participations: Vec<ProjectParticipation>,
    pub attendance_records: Vec<AttendanceRecord>,
}

impl StudentReport {
    pub async fn gather(store: &dyn Store, student: Student) -> Result<Self, StoreError> {
        let participations = store.list_student_participations(student.id).await?;
        let attendance_records = store.list_student_attendance(student.id).await?;
        Ok(Self {
            student,
            participations,
            attendance_records,
        })
    }

    pub fn total_hours(&self) -> i64 {
        total_hours(self.participations.iter().map(|p| &p.participation))
    }
}

pub fn total_hours<'a, I>(participations: I) -> i64
where
    I: IntoIterator<Item = &'a Participation>,
{
    participations.into_iter().map(|p| p.total_hours).sum()
}

pub fn project_total_hours<'a, I>(project_id: Uuid, participations: I) -> i64
where
    I: IntoIterator<Item = &'a Participation>,
{
    total_hours(
        participations
            .into_iter()
            .filter(|p| p.project_id == project_id),
    )
}

/// `dd/mm/yyyy` straight from the calendar components; no timezone involved.
pub fn format_date(date: NaiveDate) -> String {
    format!("{:02}/{:02}/{:04}", date.day(), date.month(), date.year())
}

fn format_timestamp(at: NaiveDateTime) -> String {
    format!("{}, {}", format_date(at.date()), at.format("%H:%M:%S"))
}

/// Wall-clock time at `offset`, used as the report's generation stamp.
pub fn local_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

pub fn render(report: &StudentReport, generated_at: NaiveDateTime) -> String {
    let student = &report.student;
    let mut out = String::new();

    out.push_str("RELATÓRIO DE HORAS COMPLEMENTARES\n");
    out.push_str("=====================================\n\n");
    let _ = writeln!(out, "Nome: {}", student.name);
    let _ = writeln!(out, "Matrícula: {}", student.registration);
    let _ = writeln!(out, "Curso: {}", or_not_informed(&student.course));
    let _ = writeln!(out, "Email: {}", or_not_informed(&student.email));
    let _ = writeln!(out, "Data de Geração: {}", format_date(generated_at.date()));

    out.push_str("\nPROJETOS PARTICIPADOS:\n");
    if report.participations.is_empty() {
        out.push_str("Nenhum projeto registrado");
    } else {
        let lines: Vec<String> = report
            .participations
            .iter()
            .map(|p| {
                let name = p.project.as_ref().map_or(UNKNOWN_PROJECT, |r| r.name.as_str());
                format!("- {}: {}h", name, p.participation.total_hours)
            })
            .collect();
        out.push_str(&lines.join("\n"));
    }

    let _ = write!(out, "\n\nTOTAL GERAL DE HORAS: {}h\n", report.total_hours());

    out.push_str("\nDETALHAMENTO DE ATIVIDADES:\n");
    if report.attendance_records.is_empty() {
        out.push_str("Nenhuma atividade detalhada registrada");
    } else {
        let lines: Vec<String> = report
            .attendance_records
            .iter()
            .map(|r| {
                format!(
                    "{} - {}h - {}",
                    format_date(r.date),
                    r.hours,
                    r.activity_description
                )
            })
            .collect();
        out.push_str(&lines.join("\n"));
    }

    out.push_str(
        "\n\nEste documento certifica a participação do aluno nos projetos de extensão universitária.\n",
    );
    out.push_str("\n---\n");
    out.push_str("ExtenTrack - Sistema de Gestão de Extensão Universitária\n");
    let _ = write!(
        out,
        "Documento gerado automaticamente em {}",
        format_timestamp(generated_at)
    );
    out
}

fn or_not_informed(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_INFORMED,
    }
}

pub fn file_name(registration: &str, at: DateTime<Utc>) -> String {
    format!("relatorio_{}_{}.txt", registration, at.timestamp_millis())
}

/// A rendered report on its way to the browser as a download.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub name: String,
    pub body: String,
}

impl ReportFile {
    pub fn build(report: &StudentReport, offset: FixedOffset) -> Self {
        Self {
            name: file_name(&report.student.registration, Utc::now()),
            body: render(report, local_now(offset)),
        }
    }
}

impl IntoResponse for ReportFile {
    fn into_response(self) -> Response {
        (
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.name),
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

pub async fn student_report(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(student_id): ApiPath<Uuid>,
    ctx: AuthContext,
) -> Result<ReportFile, Error> {
    ctx.require(Role::Coordinator)?;
    let student = state.store.get_student(student_id).await?;
    let report = StudentReport::gather(state.store.as_ref(), student).await?;
    log::info!("Report generated for {}", report.student.registration);
    Ok(ReportFile::build(&report, state.config.report_offset))
}
