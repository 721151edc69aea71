use serde_json::json;

#[tokio::test]
async fn echo() -> anyhow::Result<()> {
    let output = simhub::simulations::echo().await?;
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].port, "out");
    assert_eq!(output[0].json()?, json!({"x": 1}));
    Ok(())
}

#[tokio::test]
async fn gpt() -> anyhow::Result<()> {
    let report = simhub::simulations::gpt().await?;
    assert_eq!(report.model, "gpt");
    assert_eq!(report.end_time, 5.0);
    assert_eq!(report.values_on("report").count(), 9);
    Ok(())
}

#[tokio::test]
async fn gpt_network() -> anyhow::Result<()> {
    let report = simhub::simulations::gpt_network().await?;
    assert_eq!(report.model, "traffic");
    assert_eq!(report.end_time, 5.0);
    assert_eq!(report.values_on("report").count(), 9);
    Ok(())
}

#[tokio::test]
async fn gpt_seeded() -> anyhow::Result<()> {
    let report = simhub::simulations::gpt_seeded().await?;
    assert!(report.end_time <= 20.0);
    assert!(report.steps > 0);
    Ok(())
}
