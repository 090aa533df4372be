use hrana_ws::{Batch, Condition, HranaClient, Statement, Value};

fn main() -> anyhow::Result<()> {
    let mut db = HranaClient::from_env()?;

    let mut batch = Batch::new();
    let begin = batch.add_statement(Statement::execute("BEGIN", ()));
    let create = batch.add_conditional_statement(
        Condition::ok(begin),
        Statement::execute(
            "CREATE TABLE IF NOT EXISTS batch_users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            (),
        ),
    )?;
    let insert = batch.add_conditional_statement(
        Condition::ok(create),
        Statement::execute(
            "INSERT INTO batch_users (name) VALUES (?)",
            [Value::text("Alice")],
        ),
    )?;
    let commit = batch.add_conditional_step(Condition::ok(insert), "COMMIT", ())?;
    batch.add_conditional_step(
        Condition::not(Condition::ok(commit)),
        "ROLLBACK",
        (),
    )?;
    let select = batch.add_step("SELECT id, name FROM batch_users", ());

    let outcome = db.execute_batch(&batch)?;
    for index in 0..batch.len() {
        let step = hrana_ws::Step::new(index);
        if outcome.was_skipped(step) {
            println!("step {index}: skipped");
        } else if let Some(error) = outcome.error_for_step(step)? {
            eprintln!("step {index}: error: {error}");
        } else {
            println!("step {index}: ok");
        }
    }

    if let Some(rows) = outcome.result_for_step(select, true)? {
        println!("{} user(s)", rows.row_count());
        for row in rows {
            println!("{row:?}");
        }
    }

    Ok(())
}
