//! SQL and pgbench scripts fed to the clients over stdin.
//!
//! Every table is keyed so that a row's `bid` picks its shard: branch `b` owns
//! tellers `(b - 1) * 10 + 1 ..= b * 10` and accounts
//! `(b - 1) * 100000 + 1 ..= b * 100000`.

/// Accounts per unit of scale.
pub const ACCOUNTS_PER_BRANCH: u64 = 100_000;
/// Tellers per unit of scale.
pub const TELLERS_PER_BRANCH: u64 = 10;

/// Counts 1 when the cluster exposes the Limitless introspection functions.
pub const DETECT_LIMITLESS: &str = "SELECT COUNT(*) FROM pg_catalog.pg_proc p \
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace \
    WHERE n.nspname = 'rds_aurora' AND p.proname = 'limitless_stat_activity'";

/// Router endpoint hostnames joined with commas.
pub const ROUTER_ENDPOINTS: &str =
    "SELECT STRING_AGG(dns_host, ',') FROM aurora_limitless_router_endpoints()";

/// Recreates the tables, seeds branches and tellers, and queues one account
/// load per branch. Expects the psql variable `scale`.
pub const INIT_SCHEMA: &str = r#"
\set branches 1
\set tellers 10

DROP TABLE IF EXISTS pgbench_accounts CASCADE;
DROP TABLE IF EXISTS pgbench_branches CASCADE;
DROP TABLE IF EXISTS pgbench_history CASCADE;
DROP TABLE IF EXISTS pgbench_tellers CASCADE;
DROP TABLE IF EXISTS pgbench_init_queue CASCADE;

SET rds_aurora.limitless_create_table_mode = 'sharded';
SET rds_aurora.limitless_create_table_shard_key = '{"bid"}';

CREATE TABLE pgbench_branches (
    bid integer NOT NULL,
    bbalance integer,
    filler character(88)
);

CREATE TABLE pgbench_accounts (
    aid bigint NOT NULL,
    bid integer,
    abalance integer,
    filler character(84)
);

SET rds_aurora.limitless_create_table_collocate_with = 'pgbench_branches';

CREATE TABLE pgbench_tellers (
    tid integer NOT NULL,
    bid integer,
    tbalance integer,
    filler character(84)
);

CREATE TABLE pgbench_history (
    tid integer,
    bid integer,
    aid bigint,
    delta integer,
    mtime timestamp without time zone,
    filler character(22)
);

RESET rds_aurora.limitless_create_table_collocate_with;

INSERT INTO pgbench_branches (bid, bbalance)
SELECT bid, 0
FROM generate_series(1, :branches * :scale) AS bid;

INSERT INTO pgbench_tellers (tid, bid, tbalance)
SELECT tid, (tid - 1) / :tellers + 1, 0
FROM generate_series(1, :tellers * :scale) AS tid;

SET rds_aurora.limitless_create_table_mode = 'standard';

CREATE TABLE pgbench_init_queue (branch integer PRIMARY KEY);
INSERT INTO pgbench_init_queue (branch)
SELECT generate_series(1, :scale);

CREATE OR REPLACE PROCEDURE pgbench_init_accounts()
LANGUAGE plpgsql
AS $$
DECLARE
    accounts constant bigint := 100000;
    claimed integer;
BEGIN
    LOOP
        claimed := NULL;

        SELECT branch INTO claimed
        FROM pgbench_init_queue
        ORDER BY branch
        LIMIT 1
        FOR UPDATE SKIP LOCKED;

        EXIT WHEN claimed IS NULL;

        INSERT INTO pgbench_accounts (aid, bid, abalance, filler)
        SELECT aid, (aid - 1) / accounts + 1, 0, ''
        FROM generate_series((claimed - 1) * accounts + 1, claimed * accounts) AS aid;

        DELETE FROM pgbench_init_queue WHERE branch = claimed;
        COMMIT;
    END LOOP;
END
$$;
"#;

/// Run once per pgbench client; every caller drains the queue until it is empty.
pub const LOAD_ACCOUNTS: &str = "CALL pgbench_init_accounts();\n";

pub const FINALIZE_INIT: &str = r#"
ALTER TABLE pgbench_accounts
    ADD CONSTRAINT pgbench_accounts_pkey PRIMARY KEY (aid, bid);

ALTER TABLE pgbench_branches
    ADD CONSTRAINT pgbench_branches_pkey PRIMARY KEY (bid);

ALTER TABLE pgbench_tellers
    ADD CONSTRAINT pgbench_tellers_pkey PRIMARY KEY (tid, bid);

VACUUM (FREEZE) pgbench_accounts, pgbench_branches, pgbench_tellers;
"#;

pub const SIMPLE_UPDATE: &str = r#"
\set aid random(1, 100000 * :scale)
\set bid (:aid - 1) / 100000 + 1
\set tid random((:bid - 1) * 10 + 1, :bid * 10)
\set delta random(-5000, 5000)
BEGIN;
UPDATE pgbench_accounts SET abalance = abalance + :delta WHERE aid = :aid AND bid = :bid;
SELECT abalance FROM pgbench_accounts WHERE aid = :aid AND bid = :bid;
INSERT INTO pgbench_history (tid, bid, aid, delta, mtime) VALUES (:tid, :bid, :aid, :delta, CURRENT_TIMESTAMP);
END;
"#;

pub const SELECT_ONLY: &str = r#"
\set aid random(1, 100000 * :scale)
\set bid (:aid - 1) / 100000 + 1
SELECT abalance FROM pgbench_accounts WHERE aid = :aid AND bid = :bid;
"#;

pub const TPCB_LIKE: &str = r#"
\set aid random(1, 100000 * :scale)
\set bid (:aid - 1) / 100000 + 1
\set tid random((:bid - 1) * 10 + 1, :bid * 10)
\set delta random(-5000, 5000)
BEGIN;
UPDATE pgbench_accounts SET abalance = abalance + :delta WHERE aid = :aid AND bid = :bid;
SELECT abalance FROM pgbench_accounts WHERE aid = :aid AND bid = :bid;
UPDATE pgbench_tellers SET tbalance = tbalance + :delta WHERE tid = :tid AND bid = :bid;
UPDATE pgbench_branches SET bbalance = bbalance + :delta WHERE bid = :bid;
INSERT INTO pgbench_history (tid, bid, aid, delta, mtime) VALUES (:tid, :bid, :aid, :delta, CURRENT_TIMESTAMP);
END;
"#;

/// The inclusive account id range loaded for one queued branch. Its end is
/// also the number of accounts held by branches `1..=branch`.
pub fn account_range(branch: u64) -> std::ops::RangeInclusive<u64> {
    branch.saturating_sub(1) * ACCOUNTS_PER_BRANCH + 1..=branch * ACCOUNTS_PER_BRANCH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch_of(aid: u64) -> u64 {
        (aid - 1) / ACCOUNTS_PER_BRANCH + 1
    }

    #[test]
    fn zero_branches_hold_no_accounts() {
        assert!(account_range(0).is_empty());
        assert_eq!(*account_range(0).end(), 0);
    }

    #[test]
    fn account_ranges_tile_the_keyspace_and_map_back_to_their_branch() {
        let scale = 3;
        let mut next = 1;
        for branch in 1..=scale {
            let range = account_range(branch);
            assert_eq!(*range.start(), next);
            assert_eq!(range.clone().count() as u64, ACCOUNTS_PER_BRANCH);
            assert_eq!(branch_of(*range.start()), branch);
            assert_eq!(branch_of(*range.end()), branch);
            next = range.end() + 1;
        }
        assert_eq!(next - 1, scale * ACCOUNTS_PER_BRANCH);
    }

    #[test]
    fn loader_uses_the_same_account_layout() {
        assert!(INIT_SCHEMA.contains("accounts constant bigint := 100000;"));
        assert!(INIT_SCHEMA
            .contains("generate_series((claimed - 1) * accounts + 1, claimed * accounts)"));
        assert!(INIT_SCHEMA.contains("(aid - 1) / accounts + 1"));
        assert!(INIT_SCHEMA.contains(&format!("\\set tellers {TELLERS_PER_BRANCH}")));
    }

    #[test]
    fn loader_claims_with_skip_locked_and_commits_per_branch() {
        let claim = INIT_SCHEMA.find("FOR UPDATE SKIP LOCKED").unwrap();
        let delete = INIT_SCHEMA.find("DELETE FROM pgbench_init_queue").unwrap();
        let commit = INIT_SCHEMA.find("COMMIT;").unwrap();
        assert!(claim < delete && delete < commit);
    }

    #[test]
    fn write_workloads_timestamp_history_rows() {
        for script in [SIMPLE_UPDATE, TPCB_LIKE] {
            assert!(script.contains("(:tid, :bid, :aid, :delta, CURRENT_TIMESTAMP)"));
        }
    }

    #[test]
    fn workloads_target_a_single_shard() {
        for script in [SIMPLE_UPDATE, SELECT_ONLY, TPCB_LIKE] {
            assert!(script.contains("\\set bid (:aid - 1) / 100000 + 1"));
            assert!(!script.contains("random(1, 1 * :scale)"));
        }
    }
}
