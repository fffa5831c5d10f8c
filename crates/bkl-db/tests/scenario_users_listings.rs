//! Scenario: user and listing persistence rules.
//!
//! Username uniqueness is constraint-enforced and surfaced as a conflict;
//! listing writes validate input and resolve the owner before touching the
//! table so callers see not-found instead of a foreign-key failure.
//!
//! DB-backed tests. Each skips if BKL_DATABASE_URL is not set.

use uuid::Uuid;

async fn connect() -> anyhow::Result<Option<sqlx::PgPool>> {
    let url = match std::env::var(bkl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    bkl_db::migrate(&pool).await?;
    Ok(Some(pool))
}

fn new_user(username: String, is_lender: bool) -> bkl_db::NewUser {
    bkl_db::NewUser {
        user_id: Uuid::new_v4(),
        username,
        display_name: "someone".to_string(),
        is_staff: false,
        is_lender,
    }
}

#[tokio::test]
async fn username_uniqueness_is_a_conflict_not_a_precheck() -> anyhow::Result<()> {
    let pool = match connect().await? {
        Some(p) => p,
        None => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };

    let username = format!("taken_{}", Uuid::new_v4().simple());
    let first = bkl_db::insert_user(&pool, &new_user(username.clone(), false)).await?;

    // Same username, fresh id: the unique constraint answers, we translate.
    let err = bkl_db::insert_user(&pool, &new_user(username.clone(), false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert!(
        err.to_string().contains("username already taken"),
        "got: {err}"
    );

    // Whitespace-only usernames never reach the database.
    let err = bkl_db::insert_user(&pool, &new_user("   ".to_string(), false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");

    // Lookup by name round-trips; unknown names are None, not an error.
    let found = bkl_db::fetch_user_by_username(&pool, &username).await?;
    assert_eq!(found.map(|u| u.user_id), Some(first.user_id));
    let missing =
        bkl_db::fetch_user_by_username(&pool, &format!("never_{}", Uuid::new_v4().simple()))
            .await?;
    assert!(missing.is_none());

    Ok(())
}

#[tokio::test]
async fn listing_writes_validate_before_touching_the_table() -> anyhow::Result<()> {
    let pool = match connect().await? {
        Some(p) => p,
        None => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };

    let owner = bkl_db::insert_user(
        &pool,
        &new_user(format!("owner_{}", Uuid::new_v4().simple()), true),
    )
    .await?;

    let base = bkl_db::NewListing {
        listing_id: Uuid::new_v4(),
        owner_id: owner.user_id,
        title: "SM58 vocal mic".to_string(),
        price_cents: 1_500,
        tags: vec!["mic".to_string(), "dynamic".to_string()],
    };

    let err = bkl_db::insert_listing(
        &pool,
        &bkl_db::NewListing {
            title: "   ".to_string(),
            ..base.clone()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(err.to_string().contains("title"), "got: {err}");

    let err = bkl_db::insert_listing(
        &pool,
        &bkl_db::NewListing {
            price_cents: -1,
            ..base.clone()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(err.to_string().contains("non-negative"), "got: {err}");

    // Unknown owner is a not-found on the user, not a foreign-key blowup.
    let err = bkl_db::insert_listing(
        &pool,
        &bkl_db::NewListing {
            owner_id: Uuid::new_v4(),
            ..base.clone()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(err.to_string().contains("user"), "got: {err}");

    // The clean insert round-trips tags and price.
    let row = bkl_db::insert_listing(&pool, &base).await?;
    assert_eq!(row.price_cents, 1_500);
    assert_eq!(row.tags, vec!["mic".to_string(), "dynamic".to_string()]);

    let fetched = bkl_db::fetch_listing(&pool, row.listing_id).await?;
    assert_eq!(fetched.owner_id, owner.user_id);

    let ghost = Uuid::new_v4();
    let err = bkl_db::fetch_listing(&pool, ghost).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(err.to_string().contains(&ghost.to_string()), "got: {err}");

    Ok(())
}

#[tokio::test]
async fn listing_patch_is_owner_gated_and_touches_updated_at() -> anyhow::Result<()> {
    let pool = match connect().await? {
        Some(p) => p,
        None => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };

    let owner = bkl_db::insert_user(
        &pool,
        &new_user(format!("owner_{}", Uuid::new_v4().simple()), true),
    )
    .await?;
    let passerby = bkl_db::insert_user(
        &pool,
        &new_user(format!("passerby_{}", Uuid::new_v4().simple()), false),
    )
    .await?;

    let listing = bkl_db::insert_listing(
        &pool,
        &bkl_db::NewListing {
            listing_id: Uuid::new_v4(),
            owner_id: owner.user_id,
            title: "JC-120 combo".to_string(),
            price_cents: 3_000,
            tags: vec!["amp".to_string()],
        },
    )
    .await?;

    let as_owner = bkl_schemas::Actor {
        user_id: owner.user_id,
        is_staff: false,
        is_lender: true,
    };
    let as_passerby = bkl_schemas::Actor {
        user_id: passerby.user_id,
        is_staff: false,
        is_lender: false,
    };

    // Partial patch: the title changes, price and tags keep their values.
    let patched = bkl_db::update_listing(
        &pool,
        &as_owner,
        listing.listing_id,
        &bkl_db::ListingPatch {
            title: Some("JC-120 combo (reverb serviced)".to_string()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(patched.title, "JC-120 combo (reverb serviced)");
    assert_eq!(patched.price_cents, 3_000);
    assert_eq!(patched.tags, vec!["amp".to_string()]);
    assert_eq!(patched.owner_id, owner.user_id);
    assert!(
        patched.updated_at > listing.updated_at,
        "every patch must touch updated_at"
    );

    // An empty patch is legal and still touches updated_at.
    let touched = bkl_db::update_listing(
        &pool,
        &as_owner,
        listing.listing_id,
        &bkl_db::ListingPatch::default(),
    )
    .await?;
    assert!(touched.updated_at > patched.updated_at);
    assert_eq!(touched.title, patched.title);

    // Bad values are refused before the row is touched.
    let err = bkl_db::update_listing(
        &pool,
        &as_owner,
        listing.listing_id,
        &bkl_db::ListingPatch {
            title: Some("   ".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(err.to_string().contains("title"), "got: {err}");

    let err = bkl_db::update_listing(
        &pool,
        &as_owner,
        listing.listing_id,
        &bkl_db::ListingPatch {
            price_cents: Some(-5),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(err.to_string().contains("non-negative"), "got: {err}");

    // Non-owners may not edit, and a refused patch changes nothing.
    let err = bkl_db::update_listing(
        &pool,
        &as_passerby,
        listing.listing_id,
        &bkl_db::ListingPatch {
            price_cents: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "permission");
    assert!(err.to_string().contains("owner or staff"), "got: {err}");
    let unchanged = bkl_db::fetch_listing(&pool, listing.listing_id).await?;
    assert_eq!(unchanged.price_cents, 3_000);

    // Staff may reprice on the owner's behalf.
    let as_staff = bkl_schemas::Actor::staff(Uuid::new_v4());
    let repriced = bkl_db::update_listing(
        &pool,
        &as_staff,
        listing.listing_id,
        &bkl_db::ListingPatch {
            price_cents: Some(2_500),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(repriced.price_cents, 2_500);

    // Ghost listings are a not-found, not a zero-row update.
    let err = bkl_db::update_listing(
        &pool,
        &as_owner,
        Uuid::new_v4(),
        &bkl_db::ListingPatch::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    Ok(())
}

#[tokio::test]
async fn tag_filter_narrows_and_orders_newest_first() -> anyhow::Result<()> {
    let pool = match connect().await? {
        Some(p) => p,
        None => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };

    let owner = bkl_db::insert_user(
        &pool,
        &new_user(format!("owner_{}", Uuid::new_v4().simple()), true),
    )
    .await?;

    // A per-run tag keeps this test independent of whatever else is in the
    // shared table.
    let run_tag = format!("run_{}", Uuid::new_v4().simple());

    let mut make = |title: &str, tags: Vec<String>| bkl_db::NewListing {
        listing_id: Uuid::new_v4(),
        owner_id: owner.user_id,
        title: title.to_string(),
        price_cents: 2_000,
        tags,
    };

    let tagged_a = bkl_db::insert_listing(
        &pool,
        &make("Tagged A", vec![run_tag.clone(), "amp".to_string()]),
    )
    .await?;
    let tagged_b = bkl_db::insert_listing(&pool, &make("Tagged B", vec![run_tag.clone()])).await?;
    let untagged = bkl_db::insert_listing(&pool, &make("Untagged", vec!["other".to_string()]))
        .await?;

    let filtered = bkl_db::list_listings(&pool, Some(&run_tag)).await?;
    assert_eq!(filtered.len(), 2, "only the tagged pair matches");
    assert!(filtered.iter().all(|l| l.tags.contains(&run_tag)));
    assert!(filtered.iter().any(|l| l.listing_id == tagged_a.listing_id));
    assert!(filtered.iter().any(|l| l.listing_id == tagged_b.listing_id));
    assert!(
        filtered[0].created_at >= filtered[1].created_at,
        "newest first"
    );

    let all = bkl_db::list_listings(&pool, None).await?;
    assert!(all.iter().any(|l| l.listing_id == untagged.listing_id));
    assert!(all.len() >= 3);

    Ok(())
}
