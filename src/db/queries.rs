// ── users ──

pub const SELECT_USER: &str = r#"
SELECT * FROM users WHERE id = $1;
"#;

pub const INSERT_USER: &str = r#"
INSERT INTO users (id, name, email, password_hash, role, parent_id, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING *;
"#;

pub const SELECT_CHILDREN: &str = r#"
SELECT * FROM users WHERE parent_id = $1 AND role = 'child' ORDER BY created_at, id;
"#;

pub const SELECT_USERS_WITH_ROLE: &str = r#"
SELECT * FROM users WHERE role = $1 ORDER BY created_at, id;
"#;

pub const COUNT_USERS: &str = r#"
SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1);
"#;

pub const SELECT_USER_BY_EMAIL: &str = r#"
SELECT * FROM users WHERE email = $1;
"#;

pub const UPDATE_USER_PROFILE: &str = r#"
UPDATE users
SET name = COALESCE($2, name),
    email = COALESCE($3, email)
WHERE id = $1
RETURNING *;
"#;

pub const UPDATE_USER_PARENT: &str = r#"
UPDATE users SET parent_id = $2 WHERE id = $1;
"#;

// Journeys, alerts and locations cascade; children are unlinked by the FK.
pub const DELETE_USER: &str = r#"
DELETE FROM users WHERE id = $1;
"#;

pub const LOCK_CHILD: &str = r#"
SELECT id FROM users WHERE id = $1 FOR UPDATE;
"#;

// ── journeys ──

pub const SELECT_JOURNEY: &str = r#"
SELECT * FROM journeys WHERE id = $1;
"#;

pub const INSERT_JOURNEY: &str = r#"
INSERT INTO journeys (
    id, child_id, parent_id, start_location, end_location, status,
    started_at, expected_end_time, duration_minutes, created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
RETURNING *;
"#;

pub const CHILD_HAS_STARTED_JOURNEY: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM journeys WHERE child_id = $1 AND status IN ('started', 'active')
);
"#;

pub const START_SCHEDULED_JOURNEY: &str = r#"
UPDATE journeys
SET status = 'started',
    started_at = $3,
    expected_end_time = $4
WHERE id = $1 AND child_id = $2 AND status = 'scheduled'
RETURNING *;
"#;

pub const UPDATE_JOURNEY: &str = r#"
UPDATE journeys
SET start_location = COALESCE($2, start_location),
    end_location = COALESCE($3, end_location),
    duration_minutes = COALESCE($4, duration_minutes),
    status = COALESCE($5, status),
    ended_at = COALESCE($6, ended_at),
    document_path = COALESCE($7, document_path)
WHERE id = $1
  AND ($8::text IS NULL OR status = $8 OR ($8 = 'started' AND status = 'active'))
RETURNING *;
"#;

pub const DELETE_JOURNEY: &str = r#"
DELETE FROM journeys WHERE id = $1;
"#;

pub const SELECT_ACTIVE_JOURNEY: &str = r#"
SELECT * FROM journeys
WHERE child_id = $1 AND status IN ('started', 'active')
ORDER BY started_at DESC NULLS LAST, created_at DESC
LIMIT 1;
"#;

pub const SELECT_JOURNEYS_BY_CREATED: &str = r#"
SELECT * FROM journeys
WHERE ($1::uuid[] IS NULL OR child_id = ANY($1))
  AND ($2::uuid IS NULL OR parent_id = $2)
  AND ($3::text[] IS NULL OR status = ANY($3))
  AND ($4::text IS NULL OR child_id IN (
      SELECT id FROM users WHERE name ILIKE '%' || $4 || '%'
  ))
ORDER BY created_at DESC, id
LIMIT $5 OFFSET $6;
"#;

pub const SELECT_JOURNEYS_BY_STARTED: &str = r#"
SELECT * FROM journeys
WHERE ($1::uuid[] IS NULL OR child_id = ANY($1))
  AND ($2::uuid IS NULL OR parent_id = $2)
  AND ($3::text[] IS NULL OR status = ANY($3))
  AND ($4::text IS NULL OR child_id IN (
      SELECT id FROM users WHERE name ILIKE '%' || $4 || '%'
  ))
ORDER BY started_at DESC NULLS LAST, created_at DESC, id
LIMIT $5 OFFSET $6;
"#;

pub const COUNT_JOURNEYS: &str = r#"
SELECT COUNT(*) FROM journeys
WHERE ($1::uuid[] IS NULL OR child_id = ANY($1))
  AND ($2::uuid IS NULL OR parent_id = $2)
  AND ($3::text[] IS NULL OR status = ANY($3))
  AND ($4::text IS NULL OR child_id IN (
      SELECT id FROM users WHERE name ILIKE '%' || $4 || '%'
  ));
"#;

pub const SELECT_OVERDUE_JOURNEYS: &str = r#"
SELECT * FROM journeys
WHERE status IN ('started', 'active')
  AND expected_end_time IS NOT NULL
  AND expected_end_time < $1
ORDER BY expected_end_time;
"#;

// ── alerts ──

pub const SELECT_ALERT: &str = r#"
SELECT * FROM alerts WHERE id = $1;
"#;

pub const INSERT_ALERT: &str = r#"
INSERT INTO alerts (
    id, journey_id, child_id, alert_type, message, latitude, longitude, location_address, created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
RETURNING *;
"#;

// Serialises overdue checks for one journey across overlapping sweeps.
pub const LOCK_OVERDUE_JOURNEY: &str = r#"
SELECT pg_advisory_xact_lock($1);
"#;

pub const OVERDUE_ALERT_EXISTS: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM alerts
    WHERE journey_id = $1 AND alert_type = 'sos' AND message LIKE '%' || $2 || '%'
);
"#;

pub const SELECT_ALERTS: &str = r#"
SELECT * FROM alerts
WHERE ($1::uuid[] IS NULL OR child_id = ANY($1))
ORDER BY created_at DESC, id
LIMIT $2;
"#;

pub const COUNT_ALERTS: &str = r#"
SELECT COUNT(*) FROM alerts WHERE ($1::uuid[] IS NULL OR child_id = ANY($1));
"#;

// ── locations ──

pub const INSERT_LOCATION: &str = r#"
INSERT INTO locations (journey_id, latitude, longitude, recorded_at)
VALUES ($1, $2, $3, $4)
RETURNING *;
"#;

pub const SELECT_JOURNEY_LOCATIONS: &str = r#"
SELECT * FROM locations WHERE journey_id = $1 ORDER BY recorded_at, id;
"#;

pub const SELECT_LATEST_LOCATION: &str = r#"
SELECT * FROM locations WHERE journey_id = $1 ORDER BY recorded_at DESC, id DESC LIMIT 1;
"#;
