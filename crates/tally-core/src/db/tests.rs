//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Database, User) {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user("alice@example.com", "Alice", Some("hunter2"))
            .unwrap();
        (db, user)
    }

    fn add(db: &Database, user: &User, vendor: &str, d: NaiveDate, amount: f64, cat: &str) -> Expense {
        let new = NewExpense::new(vendor, d, amount, cat).validate().unwrap();
        db.create_expense(&user.user_id, &new).unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let (db, user) = setup();
        assert!(db
            .list_expenses(&user.user_id, &ExpenseFilter::new(), 100)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_schema_has_expected_tables() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'sessions', 'expenses', 'audit_log')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_new_id_format() {
        let id = new_id("exp");
        assert!(id.starts_with("exp_"));
        assert_eq!(id.len(), 4 + 12);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_id("exp"), new_id("exp"));
    }

    #[test]
    fn test_expense_create_and_get() {
        let (db, user) = setup();

        let mut new = NewExpense::new("Loblaws", date(2024, 3, 2), 42.1, "Groceries");
        new.currency = "CAD".into();
        new.tags = vec!["work".into(), "client-a".into()];
        new.line_items = vec![LineItem {
            description: "Milk".into(),
            quantity: 2.0,
            unit_price: Some(3.5),
            total: Some(7.0),
        }];
        new.confidence_score = Some(0.9);
        let created = db
            .create_expense(&user.user_id, &new.validate().unwrap())
            .unwrap();
        assert!(created.expense_id.starts_with("exp_"));

        let fetched = db
            .get_expense(&user.user_id, &created.expense_id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.vendor, "Loblaws");
        assert_eq!(fetched.date, date(2024, 3, 2));
        assert_eq!(fetched.amount, 42.1);
        assert_eq!(fetched.currency, "CAD");
        assert_eq!(fetched.tags, vec!["work", "client-a"]);
        assert_eq!(fetched.line_items.len(), 1);
        assert_eq!(fetched.line_items[0].quantity, 2.0);
        assert_eq!(fetched.confidence_score, Some(0.9));
    }

    #[test]
    fn test_expenses_are_owner_scoped() {
        let (db, alice) = setup();
        let bob = db.create_user("bob@example.com", "Bob", None).unwrap();

        let expense = add(&db, &alice, "Staples", date(2024, 1, 5), 20.0, "Office Supplies");

        assert!(db.get_expense(&bob.user_id, &expense.expense_id).unwrap().is_none());
        assert!(!db
            .update_expense(
                &bob.user_id,
                &expense.expense_id,
                &ExpenseUpdate {
                    vendor: Some("Hacked".into()),
                    ..Default::default()
                }
            )
            .unwrap());
        assert!(!db.delete_expense(&bob.user_id, &expense.expense_id).unwrap());

        let still = db
            .get_expense(&alice.user_id, &expense.expense_id)
            .unwrap()
            .unwrap();
        assert_eq!(still.vendor, "Staples");
    }

    #[test]
    fn test_list_orders_by_date_desc() {
        let (db, user) = setup();
        add(&db, &user, "A", date(2024, 1, 1), 1.0, "Other");
        add(&db, &user, "C", date(2024, 3, 1), 3.0, "Other");
        add(&db, &user, "B", date(2024, 2, 1), 2.0, "Other");

        let all = db
            .list_expenses(&user.user_id, &ExpenseFilter::new(), 100)
            .unwrap();
        let vendors: Vec<&str> = all.iter().map(|e| e.vendor.as_str()).collect();
        assert_eq!(vendors, vec!["C", "B", "A"]);

        let limited = db
            .list_expenses(&user.user_id, &ExpenseFilter::new(), 2)
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_list_filters() {
        let (db, user) = setup();
        add(&db, &user, "Tim Hortons", date(2024, 1, 10), 5.0, "Meals & Dining");
        add(&db, &user, "Loblaws", date(2024, 2, 10), 80.0, "Groceries");
        add(&db, &user, "Uber", date(2024, 3, 10), 25.0, "Transportation");

        let in_feb = db
            .list_expenses(
                &user.user_id,
                &ExpenseFilter::new().date_range(Some(date(2024, 2, 1)), Some(date(2024, 2, 29))),
                100,
            )
            .unwrap();
        assert_eq!(in_feb.len(), 1);
        assert_eq!(in_feb[0].vendor, "Loblaws");

        let groceries = db
            .list_expenses(&user.user_id, &ExpenseFilter::new().category(Some("Groceries")), 100)
            .unwrap();
        assert_eq!(groceries.len(), 1);

        let two_cats = db
            .list_expenses(
                &user.user_id,
                &ExpenseFilter::new()
                    .categories(Some(vec!["Groceries".into(), "Transportation".into()])),
                100,
            )
            .unwrap();
        assert_eq!(two_cats.len(), 2);

        let pricey = db
            .list_expenses(
                &user.user_id,
                &ExpenseFilter::new().amount_range(Some(20.0), Some(50.0)),
                100,
            )
            .unwrap();
        assert_eq!(pricey.len(), 1);
        assert_eq!(pricey[0].vendor, "Uber");

        let by_vendor = db
            .list_expenses(&user.user_id, &ExpenseFilter::new().vendor(Some("hort")), 100)
            .unwrap();
        assert_eq!(by_vendor.len(), 1);
        assert_eq!(by_vendor[0].vendor, "Tim Hortons");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let (db, user) = setup();
        add(&db, &user, "Start", date(2024, 1, 1), 1.0, "Other");
        add(&db, &user, "End", date(2024, 1, 31), 1.0, "Other");
        add(&db, &user, "Outside", date(2024, 2, 1), 1.0, "Other");

        let january = db
            .list_expenses(
                &user.user_id,
                &ExpenseFilter::new().date_range(Some(date(2024, 1, 1)), Some(date(2024, 1, 31))),
                100,
            )
            .unwrap();
        assert_eq!(january.len(), 2);
    }

    #[test]
    fn test_search_and_tag_filter() {
        let (db, user) = setup();

        let mut tagged = NewExpense::new("Best Buy", date(2024, 4, 1), 199.99, "Equipment");
        tagged.tags = vec!["home-office".into()];
        tagged.notes = Some("monitor for desk".into());
        db.create_expense(&user.user_id, &tagged.validate().unwrap())
            .unwrap();
        add(&db, &user, "Shell", date(2024, 4, 2), 60.0, "Transportation");

        let by_tag = db
            .list_expenses(&user.user_id, &ExpenseFilter::new().tag(Some("home-office")), 100)
            .unwrap();
        assert_eq!(by_tag.len(), 1);

        let by_notes = db
            .list_expenses(&user.user_id, &ExpenseFilter::new().search(Some("monitor")), 100)
            .unwrap();
        assert_eq!(by_notes.len(), 1);
        assert_eq!(by_notes[0].vendor, "Best Buy");

        // Wildcards in user input are literal
        let literal = db
            .list_expenses(&user.user_id, &ExpenseFilter::new().search(Some("%")), 100)
            .unwrap();
        assert!(literal.is_empty());
    }

    #[test]
    fn test_partial_update() {
        let (db, user) = setup();
        let expense = add(&db, &user, "Costco", date(2024, 5, 1), 150.0, "Groceries");

        let changed = db
            .update_expense(
                &user.user_id,
                &expense.expense_id,
                &ExpenseUpdate {
                    amount: Some(155.25),
                    tags: Some(vec!["bulk".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(changed);

        let updated = db
            .get_expense(&user.user_id, &expense.expense_id)
            .unwrap()
            .unwrap();
        assert_eq!(updated.amount, 155.25);
        assert_eq!(updated.tags, vec!["bulk"]);
        assert_eq!(updated.vendor, "Costco");
        assert_eq!(updated.category, "Groceries");
        assert!(updated.updated_at >= expense.updated_at);
    }

    #[test]
    fn test_bulk_delete_skips_foreign_ids() {
        let (db, alice) = setup();
        let bob = db.create_user("bob@example.com", "Bob", None).unwrap();

        let x = add(&db, &alice, "X", date(2024, 1, 1), 1.0, "Other");
        let y = add(&db, &bob, "Y", date(2024, 1, 1), 1.0, "Other");

        let deleted = db
            .bulk_delete_expenses(
                &alice.user_id,
                &[x.expense_id.clone(), y.expense_id.clone(), "exp_missing".into()],
            )
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_expense(&alice.user_id, &x.expense_id).unwrap().is_none());
        assert!(db.get_expense(&bob.user_id, &y.expense_id).unwrap().is_some());

        assert_eq!(db.bulk_delete_expenses(&alice.user_id, &[]).unwrap(), 0);
    }

    #[test]
    fn test_list_tags_distinct_sorted() {
        let (db, user) = setup();

        let mut a = NewExpense::new("A", date(2024, 1, 1), 1.0, "Other");
        a.tags = vec!["travel".into(), "client-b".into()];
        let mut b = NewExpense::new("B", date(2024, 1, 2), 1.0, "Other");
        b.tags = vec!["travel".into()];
        db.create_expense(&user.user_id, &a).unwrap();
        db.create_expense(&user.user_id, &b).unwrap();

        assert_eq!(db.list_tags(&user.user_id).unwrap(), vec!["client-b", "travel"]);
        assert_eq!(
            db.list_expenses(&user.user_id, &ExpenseFilter::new(), LIST_LIMIT)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_user_create_and_authenticate() {
        let (db, user) = setup();
        assert!(user.user_id.starts_with("user_"));

        let found = db.authenticate("ALICE@example.com", "hunter2").unwrap();
        assert_eq!(found.map(|u| u.user_id), Some(user.user_id.clone()));

        assert!(db.authenticate("alice@example.com", "wrong").unwrap().is_none());
        assert!(db.authenticate("nobody@example.com", "hunter2").unwrap().is_none());

        // Duplicate email
        assert!(db.create_user("alice@example.com", "Other", None).is_err());
        assert!(db.create_user("not-an-email", "Other", None).is_err());
    }

    #[test]
    fn test_passwordless_user_cannot_log_in() {
        let db = Database::in_memory().unwrap();
        db.create_user("cli@example.com", "CLI", None).unwrap();
        assert!(db.authenticate("cli@example.com", "").unwrap().is_none());
    }

    #[test]
    fn test_session_lifecycle() {
        let (db, user) = setup();
        let session = db.create_session(&user.user_id).unwrap();
        assert_eq!(session.session_token.len(), 64);
        assert!(!session.is_expired(Utc::now()));

        let resolved = db
            .get_session_user(&session.session_token, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.email, "alice@example.com");

        assert!(db.delete_session(&session.session_token).unwrap());
        assert!(db
            .get_session_user(&session.session_token, Utc::now())
            .unwrap()
            .is_none());
        assert!(!db.delete_session(&session.session_token).unwrap());
    }

    #[test]
    fn test_expired_session_is_removed() {
        let (db, user) = setup();
        let session = db.create_session(&user.user_id).unwrap();

        let later = Utc::now() + Duration::days(SESSION_TTL_DAYS + 1);
        assert!(db
            .get_session_user(&session.session_token, later)
            .unwrap()
            .is_none());

        // Gone even when asked again with the real clock
        assert!(db
            .get_session_user(&session.session_token, Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_purge_expired_sessions() {
        let (db, user) = setup();
        db.create_session(&user.user_id).unwrap();
        db.create_session(&user.user_id).unwrap();

        assert_eq!(db.purge_expired_sessions(Utc::now()).unwrap(), 0);
        let later = Utc::now() + Duration::days(SESSION_TTL_DAYS + 1);
        assert_eq!(db.purge_expired_sessions(later).unwrap(), 2);
    }

    #[test]
    fn test_admin_stats() {
        let (db, alice) = setup();
        let bob = db.create_user("bob@example.com", "Bob", None).unwrap();
        add(&db, &alice, "A", date(2024, 1, 1), 10.0, "Other");
        add(&db, &alice, "B", date(2024, 1, 2), 5.5, "Other");
        db.create_session(&alice.user_id).unwrap();

        let stats = db.admin_stats(Utc::now()).unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_expenses, 2);
        assert_eq!(stats.total_amount, 15.5);
        assert_eq!(stats.active_sessions, 1);

        let users = db.list_users_with_stats().unwrap();
        let bob_row = users.iter().find(|u| u.user_id == bob.user_id).unwrap();
        assert_eq!(bob_row.expense_count, 0);
        assert_eq!(bob_row.total_amount, 0.0);
        let alice_row = users.iter().find(|u| u.user_id == alice.user_id).unwrap();
        assert_eq!(alice_row.expense_count, 2);
    }

    #[test]
    fn test_expenses_in_range_with_categories() {
        let (db, user) = setup();
        add(&db, &user, "Air Canada", date(2024, 6, 3), 400.0, "Travel");
        add(&db, &user, "Loblaws", date(2024, 6, 4), 50.0, "Groceries");
        add(&db, &user, "Old Trip", date(2024, 5, 1), 300.0, "Travel");

        let june = db
            .expenses_in_range(&user.user_id, Some(date(2024, 6, 1)), Some(date(2024, 6, 30)), None)
            .unwrap();
        assert_eq!(june.len(), 2);
        assert_eq!(june[0].vendor, "Loblaws");

        let june_travel = db
            .expenses_in_range(
                &user.user_id,
                Some(date(2024, 6, 1)),
                Some(date(2024, 6, 30)),
                Some(vec!["Travel".into()]),
            )
            .unwrap();
        assert_eq!(june_travel.len(), 1);
        assert_eq!(june_travel[0].vendor, "Air Canada");
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("alice@example.com", "expense.create", Some("expense"), Some("exp_1"), None)
            .unwrap();
        db.log_audit("alice@example.com", "expense.delete", Some("expense"), Some("exp_1"), None)
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "expense.delete");
        assert_eq!(entries[1].entity_id.as_deref(), Some("exp_1"));
    }
}
