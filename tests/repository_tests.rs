use yamdb_api::{
    MemoryRepository,
    models::{
        NewComment, NewReview, NewTitle, NewUser, Role, TaxonomyKind, TitleChanges, TitleFilter,
        UserChanges,
    },
    repository::{Repository, constraints},
};

// --- Test Data Helpers ---

async fn user(repo: &MemoryRepository, username: &str) -> i64 {
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        ..NewUser::default()
    })
    .await
    .unwrap()
    .id
}

async fn title(repo: &MemoryRepository, name: &str, genre_ids: Vec<i64>, category_id: Option<i64>) -> i64 {
    repo.create_title(NewTitle {
        name: name.to_string(),
        year: 2001,
        description: None,
        category_id,
        genre_ids,
    })
    .await
    .unwrap()
    .id
}

async fn review(repo: &MemoryRepository, title_id: i64, author_id: i64, score: i32) -> i64 {
    repo.create_review(NewReview {
        title_id,
        author_id,
        text: "text".to_string(),
        score,
    })
    .await
    .unwrap()
    .id
}

// --- Users & codes ---

#[tokio::test]
async fn test_get_or_create_reuses_exact_pair() {
    let repo = MemoryRepository::new();
    let first = repo.get_or_create_user("ann@example.com", "ann").await.unwrap();
    let again = repo.get_or_create_user("ann@example.com", "ann").await.unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(first.role, Role::User);
    assert_eq!(repo.list_users(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unique_violations_name_the_constraint() {
    let repo = MemoryRepository::new();
    repo.get_or_create_user("ann@example.com", "ann").await.unwrap();

    let err = repo
        .get_or_create_user("ann@example.com", "other")
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some(constraints::USERS_EMAIL));

    let err = repo
        .get_or_create_user("other@example.com", "ann")
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some(constraints::USERS_USERNAME));

    // Both collide with different rows: email is reported first.
    repo.get_or_create_user("bob@example.com", "bob").await.unwrap();
    let err = repo
        .get_or_create_user("bob@example.com", "ann")
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some(constraints::USERS_EMAIL));
}

#[tokio::test]
async fn test_update_user_checks_uniqueness_against_others_only() {
    let repo = MemoryRepository::new();
    let ann = user(&repo, "ann").await;
    user(&repo, "bob").await;

    let same = repo
        .update_user(
            ann,
            UserChanges {
                username: Some("ann".to_string()),
                bio: Some("hi".to_string()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(same.bio, "hi");

    let err = repo
        .update_user(
            ann,
            UserChanges {
                username: Some("bob".to_string()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some(constraints::USERS_USERNAME));

    assert!(repo.update_user(9999, UserChanges::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_confirmation_code_is_consumed_once() {
    let repo = MemoryRepository::new();
    let ann = user(&repo, "ann").await;

    assert!(!repo.consume_confirmation_code(ann, "123456").await.unwrap());

    repo.set_confirmation_code(ann, "123456").await.unwrap();
    assert!(!repo.consume_confirmation_code(ann, "654321").await.unwrap());
    assert!(repo.consume_confirmation_code(ann, "123456").await.unwrap());
    assert!(!repo.consume_confirmation_code(ann, "123456").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_consumers_get_one_success() {
    let repo = std::sync::Arc::new(MemoryRepository::new());
    let ann = user(&repo, "ann").await;
    repo.set_confirmation_code(ann, "777777").await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.consume_confirmation_code(ann, "777777").await.unwrap() })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_list_users_search_and_order() {
    let repo = MemoryRepository::new();
    user(&repo, "zed").await;
    user(&repo, "anna").await;
    user(&repo, "hannah").await;

    let names: Vec<String> = repo
        .list_users(Some("ANN"))
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, vec!["anna", "hannah"]);
}

// --- Taxonomy & titles ---

#[tokio::test]
async fn test_taxonomy_slug_unique_per_kind() {
    let repo = MemoryRepository::new();
    repo.create_taxonomy(TaxonomyKind::Genre, "Drama", "drama")
        .await
        .unwrap();
    // Same slug in the other table is fine.
    repo.create_taxonomy(TaxonomyKind::Category, "Drama", "drama")
        .await
        .unwrap();

    let err = repo
        .create_taxonomy(TaxonomyKind::Genre, "Drama 2", "drama")
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some(constraints::GENRES_SLUG));
}

#[tokio::test]
async fn test_taxonomy_listed_newest_first() {
    let repo = MemoryRepository::new();
    for slug in ["a", "b", "c"] {
        repo.create_taxonomy(TaxonomyKind::Category, slug, slug)
            .await
            .unwrap();
    }
    let slugs: Vec<String> = repo
        .list_taxonomy(TaxonomyKind::Category, None)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.slug)
        .collect();
    assert_eq!(slugs, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_rating_is_mean_or_none() {
    let repo = MemoryRepository::new();
    let t = title(&repo, "Heat", vec![], None).await;
    assert_eq!(repo.get_title(t).await.unwrap().unwrap().rating, None);

    for (name, score) in [("a", 8), ("b", 6), ("c", 4)] {
        let author = user(&repo, name).await;
        review(&repo, t, author, score).await;
    }
    assert_eq!(repo.get_title(t).await.unwrap().unwrap().rating, Some(6.0));
}

#[tokio::test]
async fn test_duplicate_review_violates_constraint() {
    let repo = MemoryRepository::new();
    let t = title(&repo, "Heat", vec![], None).await;
    let ann = user(&repo, "ann").await;
    review(&repo, t, ann, 5).await;

    let err = repo
        .create_review(NewReview {
            title_id: t,
            author_id: ann,
            text: "again".to_string(),
            score: 6,
        })
        .await
        .unwrap_err();
    assert_eq!(err.constraint(), Some(constraints::REVIEWS_TITLE_AUTHOR));
}

#[tokio::test]
async fn test_deleting_taxonomy_detaches_titles() {
    let repo = MemoryRepository::new();
    let films = repo
        .create_taxonomy(TaxonomyKind::Category, "Films", "films")
        .await
        .unwrap();
    let drama = repo
        .create_taxonomy(TaxonomyKind::Genre, "Drama", "drama")
        .await
        .unwrap();
    let crime = repo
        .create_taxonomy(TaxonomyKind::Genre, "Crime", "crime")
        .await
        .unwrap();
    let t = title(&repo, "Heat", vec![drama.id, crime.id], Some(films.id)).await;

    assert!(repo.delete_taxonomy(TaxonomyKind::Category, "films").await.unwrap());
    assert!(repo.delete_taxonomy(TaxonomyKind::Genre, "drama").await.unwrap());
    assert!(!repo.delete_taxonomy(TaxonomyKind::Genre, "drama").await.unwrap());

    let heat = repo.get_title(t).await.unwrap().unwrap();
    assert_eq!(heat.category, None);
    assert_eq!(heat.genre, vec![crime]);
}

#[tokio::test]
async fn test_title_filters() {
    let repo = MemoryRepository::new();
    let films = repo
        .create_taxonomy(TaxonomyKind::Category, "Films", "films")
        .await
        .unwrap();
    let drama = repo
        .create_taxonomy(TaxonomyKind::Genre, "Drama", "drama")
        .await
        .unwrap();
    title(&repo, "Heat", vec![drama.id], Some(films.id)).await;
    title(&repo, "Alien", vec![], None).await;

    let all = repo.list_titles(&TitleFilter::default()).await.unwrap();
    let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Alien", "Heat"]);

    let by_genre = repo
        .list_titles(&TitleFilter {
            genre: Some("drama".to_string()),
            ..TitleFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_genre.len(), 1);

    let by_name = repo
        .list_titles(&TitleFilter {
            name: Some("LIE".to_string()),
            year: Some(2001),
            ..TitleFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(by_name[0].name, "Alien");

    let none = repo
        .list_titles(&TitleFilter {
            category: Some("films".to_string()),
            year: Some(1999),
            ..TitleFilter::default()
        })
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_update_title_partial() {
    let repo = MemoryRepository::new();
    let drama = repo
        .create_taxonomy(TaxonomyKind::Genre, "Drama", "drama")
        .await
        .unwrap();
    let t = title(&repo, "Heat", vec![drama.id], None).await;

    let updated = repo
        .update_title(
            t,
            TitleChanges {
                year: Some(1995),
                genre_ids: Some(vec![]),
                ..TitleChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Heat");
    assert_eq!(updated.year, 1995);
    assert!(updated.genre.is_empty());
}

#[tokio::test]
async fn test_update_title_sets_and_clears_description() {
    let repo = MemoryRepository::new();
    let t = title(&repo, "Heat", vec![], None).await;

    let set = repo
        .update_title(
            t,
            TitleChanges {
                description: Some(Some("Heist".to_string())),
                ..TitleChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.description.as_deref(), Some("Heist"));

    let untouched = repo
        .update_title(t, TitleChanges::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.description.as_deref(), Some("Heist"));

    let cleared = repo
        .update_title(
            t,
            TitleChanges {
                description: Some(None),
                ..TitleChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.description, None);
}

// --- Cascades ---

#[tokio::test]
async fn test_deleting_title_cascades_to_reviews_and_comments() {
    let repo = MemoryRepository::new();
    let t = title(&repo, "Heat", vec![], None).await;
    let ann = user(&repo, "ann").await;
    let r = review(&repo, t, ann, 7).await;
    let c = repo
        .create_comment(NewComment {
            review_id: r,
            author_id: ann,
            text: "c".to_string(),
        })
        .await
        .unwrap();

    assert!(repo.delete_title(t).await.unwrap());
    assert!(repo.get_review(t, r).await.unwrap().is_none());
    assert!(repo.get_comment(r, c.id).await.unwrap().is_none());
    assert!(!repo.delete_title(t).await.unwrap());
}

#[tokio::test]
async fn test_deleting_user_removes_their_reviews_and_comments() {
    let repo = MemoryRepository::new();
    let t = title(&repo, "Heat", vec![], None).await;
    let ann = user(&repo, "ann").await;
    let bob = user(&repo, "bob").await;
    let ann_review = review(&repo, t, ann, 2).await;
    let bob_review = review(&repo, t, bob, 10).await;
    repo.create_comment(NewComment {
        review_id: ann_review,
        author_id: bob,
        text: "on ann".to_string(),
    })
    .await
    .unwrap();
    repo.create_comment(NewComment {
        review_id: bob_review,
        author_id: ann,
        text: "by ann".to_string(),
    })
    .await
    .unwrap();

    assert!(repo.delete_user(ann).await.unwrap());

    let reviews = repo.list_reviews(t).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].author, "bob");
    assert!(repo.list_comments(bob_review).await.unwrap().is_empty());
    assert!(repo.list_comments(ann_review).await.unwrap().is_empty());
    assert_eq!(repo.get_title(t).await.unwrap().unwrap().rating, Some(10.0));
}

#[tokio::test]
async fn test_nested_lookups_respect_parent() {
    let repo = MemoryRepository::new();
    let heat = title(&repo, "Heat", vec![], None).await;
    let alien = title(&repo, "Alien", vec![], None).await;
    let ann = user(&repo, "ann").await;
    let r = review(&repo, heat, ann, 7).await;

    assert!(repo.get_review(heat, r).await.unwrap().is_some());
    assert!(repo.get_review(alien, r).await.unwrap().is_none());
}
