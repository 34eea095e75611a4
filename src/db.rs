use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::RiskConfig;
use crate::models::{FactorKind, HistoryPoint, ReadingRecord, RiskAssessment, RiskLevel};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("7a1e8d90-4c2b-4f6e-9b1d-2f8c5a6e4d31")?,
            "Dana Whitfield",
            "dana.whitfield@northfield.edu",
            "2026",
        ),
        (
            Uuid::parse_str("b4f2c7e1-88a3-4d15-a0c9-5e6d7b8a9f02")?,
            "Omar Ajayi",
            "omar.ajayi@northfield.edu",
            "2026",
        ),
        (
            Uuid::parse_str("c9d3e5f7-1a2b-4c4d-8e9f-0a1b2c3d4e5f")?,
            "Priya Raman",
            "priya.raman@northfield.edu",
            "2027",
        ),
        (
            Uuid::parse_str("e2a4b6c8-3d5e-4f70-91a2-b3c4d5e6f708")?,
            "Theo Lindqvist",
            "theo.lindqvist@northfield.edu",
            "2027",
        ),
    ];

    for (id, name, email, cohort) in students {
        sqlx::query(
            r#"
            INSERT INTO student_risk.students (id, full_name, email, cohort)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, cohort = EXCLUDED.cohort
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(cohort)
        .fetch_one(pool)
        .await?;
    }

    let readings = vec![
        (
            "seed-001",
            "dana.whitfield@northfield.edu",
            FactorKind::Gpa,
            1.9,
            NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?,
        ),
        (
            "seed-002",
            "dana.whitfield@northfield.edu",
            FactorKind::Attendance,
            68.0,
            NaiveDate::from_ymd_opt(2026, 2, 9).context("invalid date")?,
        ),
        (
            "seed-003",
            "dana.whitfield@northfield.edu",
            FactorKind::Assignments,
            55.0,
            NaiveDate::from_ymd_opt(2026, 2, 9).context("invalid date")?,
        ),
        (
            "seed-004",
            "dana.whitfield@northfield.edu",
            FactorKind::Behavior,
            62.0,
            NaiveDate::from_ymd_opt(2026, 2, 11).context("invalid date")?,
        ),
        (
            "seed-005",
            "omar.ajayi@northfield.edu",
            FactorKind::Gpa,
            3.6,
            NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?,
        ),
        (
            "seed-006",
            "omar.ajayi@northfield.edu",
            FactorKind::Attendance,
            94.0,
            NaiveDate::from_ymd_opt(2026, 2, 9).context("invalid date")?,
        ),
        (
            "seed-007",
            "omar.ajayi@northfield.edu",
            FactorKind::Assignments,
            90.0,
            NaiveDate::from_ymd_opt(2026, 2, 10).context("invalid date")?,
        ),
        (
            "seed-008",
            "priya.raman@northfield.edu",
            FactorKind::Gpa,
            2.8,
            NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?,
        ),
        (
            "seed-009",
            "priya.raman@northfield.edu",
            FactorKind::Attendance,
            81.0,
            NaiveDate::from_ymd_opt(2026, 2, 12).context("invalid date")?,
        ),
        (
            "seed-010",
            "priya.raman@northfield.edu",
            FactorKind::Assignments,
            77.0,
            NaiveDate::from_ymd_opt(2026, 2, 12).context("invalid date")?,
        ),
        (
            "seed-011",
            "priya.raman@northfield.edu",
            FactorKind::Behavior,
            80.0,
            NaiveDate::from_ymd_opt(2026, 2, 13).context("invalid date")?,
        ),
        (
            "seed-012",
            "theo.lindqvist@northfield.edu",
            FactorKind::Gpa,
            2.4,
            NaiveDate::from_ymd_opt(2026, 1, 20).context("invalid date")?,
        ),
        (
            "seed-013",
            "theo.lindqvist@northfield.edu",
            FactorKind::Gpa,
            1.2,
            NaiveDate::from_ymd_opt(2026, 2, 17).context("invalid date")?,
        ),
        (
            "seed-014",
            "theo.lindqvist@northfield.edu",
            FactorKind::Attendance,
            55.0,
            NaiveDate::from_ymd_opt(2026, 2, 16).context("invalid date")?,
        ),
        (
            "seed-015",
            "theo.lindqvist@northfield.edu",
            FactorKind::Assignments,
            40.0,
            NaiveDate::from_ymd_opt(2026, 2, 16).context("invalid date")?,
        ),
        (
            "seed-016",
            "theo.lindqvist@northfield.edu",
            FactorKind::Behavior,
            35.0,
            NaiveDate::from_ymd_opt(2026, 2, 18).context("invalid date")?,
        ),
    ];

    for (source_key, email, factor, value, observed_at) in readings {
        let student_id: Uuid =
            sqlx::query("SELECT id FROM student_risk.students WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?
                .get("id");

        sqlx::query(
            r#"
            INSERT INTO student_risk.factor_readings
            (id, student_id, factor, value, observed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(factor.as_str())
        .bind(value)
        .bind(observed_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let active = sqlx::query("SELECT id FROM student_risk.risk_configs WHERE active LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if active.is_none() {
        insert_config(pool, &RiskConfig::default()).await?;
    }

    Ok(())
}

// One row per (student, factor): the most recently observed reading.
pub async fn fetch_latest_readings(
    pool: &PgPool,
    cohort: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<ReadingRecord>> {
    let mut query = String::from(
        "SELECT DISTINCT ON (st.id, fr.factor) \
         st.id as student_id, st.full_name, st.email, st.cohort, \
         fr.factor, fr.value, fr.observed_at \
         FROM student_risk.factor_readings fr \
         JOIN student_risk.students st ON st.id = fr.student_id",
    );

    if cohort.is_some() {
        query.push_str(" WHERE st.cohort = $1");
    } else if email.is_some() {
        query.push_str(" WHERE st.email = $1");
    }
    query.push_str(" ORDER BY st.id, fr.factor, fr.observed_at DESC");

    let mut rows = sqlx::query(&query);
    if let Some(value) = cohort {
        rows = rows.bind(value);
    } else if let Some(value) = email {
        rows = rows.bind(value);
    }

    let mut records = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let factor_name: String = row.get("factor");
        let email: String = row.get("email");
        let factor = FactorKind::from_str_loose(&factor_name)
            .with_context(|| format!("unknown factor '{factor_name}' stored for {email}"))?;
        records.push(ReadingRecord {
            student_id: row.get("student_id"),
            full_name: row.get("full_name"),
            email,
            cohort: row.get("cohort"),
            factor,
            value: row.get("value"),
            observed_at: row.get("observed_at"),
        });
    }

    Ok(records)
}

pub async fn active_config(pool: &PgPool) -> anyhow::Result<RiskConfig> {
    let row = sqlx::query(
        "SELECT id, payload FROM student_risk.risk_configs \
         WHERE active ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    .context("no active configuration; run `seed` or `update-config` first")?;

    let payload: String = row.get("payload");
    let mut config: RiskConfig =
        serde_json::from_str(&payload).context("stored configuration payload does not parse")?;
    config.id = Some(row.get("id"));
    Ok(config)
}

// Stores the snapshot as the new active configuration and deactivates the
// previous one; prior snapshots stay on record for assessments that
// reference them.
pub async fn insert_config(pool: &PgPool, config: &RiskConfig) -> anyhow::Result<RiskConfig> {
    let payload = serde_json::to_string(config)?;
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE student_risk.risk_configs SET active = FALSE WHERE active")
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO student_risk.risk_configs (id, active, payload) VALUES ($1, TRUE, $2)")
        .bind(id)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let mut stored = config.clone();
    stored.id = Some(id);
    Ok(stored)
}

pub async fn insert_assessment(
    pool: &PgPool,
    student_id: Uuid,
    assessment: &RiskAssessment,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO student_risk.assessments
        (id, student_id, config_id, assessed_at, score, level, breakdown, warnings)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(assessment.config_id)
    .bind(assessment.assessed_at)
    .bind(assessment.score)
    .bind(assessment.level.as_str())
    .bind(serde_json::to_string(&assessment.breakdown)?)
    .bind(serde_json::to_string(&assessment.warnings)?)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_history(
    pool: &PgPool,
    since_date: NaiveDate,
    cohort: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<HistoryPoint>> {
    let mut query = String::from(
        "SELECT a.assessed_at::date as assessed_on, a.score, a.level \
         FROM student_risk.assessments a \
         JOIN student_risk.students st ON st.id = a.student_id \
         WHERE a.assessed_at::date >= $1",
    );

    if cohort.is_some() {
        query.push_str(" AND st.cohort = $2");
    } else if email.is_some() {
        query.push_str(" AND st.email = $2");
    }
    query.push_str(" ORDER BY assessed_on");

    let mut rows = sqlx::query(&query).bind(since_date);
    if let Some(value) = cohort {
        rows = rows.bind(value);
    } else if let Some(value) = email {
        rows = rows.bind(value);
    }

    let mut history = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let level_name: String = row.get("level");
        let level = RiskLevel::from_str_loose(&level_name)
            .with_context(|| format!("unknown risk level '{level_name}' stored"))?;
        history.push(HistoryPoint {
            assessed_on: row.get("assessed_on"),
            score: row.get("score"),
            level,
        });
    }

    Ok(history)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        cohort: String,
        factor: String,
        value: f64,
        observed_at: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let factor = FactorKind::from_str_loose(&row.factor).with_context(|| {
            let valid: Vec<&str> = FactorKind::ALL.iter().map(|f| f.as_str()).collect();
            format!(
                "unknown factor '{}' for {} (expected one of {})",
                row.factor,
                row.email,
                valid.join(", ")
            )
        })?;

        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO student_risk.students
            (id, full_name, email, cohort)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, cohort = EXCLUDED.cohort
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(&row.cohort)
        .fetch_one(pool)
        .await?
        .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO student_risk.factor_readings
            (id, student_id, factor, value, observed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(factor.as_str())
        .bind(row.value)
        .bind(row.observed_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
