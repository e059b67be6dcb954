//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use delivery_types::{
        CompanyId, CompanyRepository, CreateCompanyRequest, DomainError, ListParcelsQuery,
        NewParcel, ParcelId, ParcelRepository, ParcelTypeId, Rate, RepoError, SessionId,
    };

    use std::sync::Arc;

    use tokio::sync::Barrier;

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn new_parcel(session: &str, name: &str, type_id: i64) -> NewParcel {
        NewParcel::new(
            SessionId::new(session),
            name.to_string(),
            2.0,
            ParcelTypeId::new(type_id),
            100.0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_parcel_types_are_seeded() {
        let repo = setup_repo().await;

        let types = repo.list_parcel_types().await.unwrap();
        let names: Vec<_> = types.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names, vec!["clothing", "electronics", "misc"]);

        let first = repo.get_parcel_type(types[0].id).await.unwrap().unwrap();
        assert_eq!(first.name, "clothing");
        assert!(
            repo.get_parcel_type(ParcelTypeId::new(999))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_create_and_find_parcel() {
        let repo = setup_repo().await;

        let id = repo
            .create_parcel(new_parcel("s1", "Jacket", 1))
            .await
            .unwrap();

        let found = repo
            .find_by_name_and_session("Jacket", &SessionId::new("s1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, id);
        assert_eq!(found.weight, 2.0);
        assert_eq!(found.delivery_price, None);
        assert_eq!(found.company_id, None);
    }

    #[tokio::test]
    async fn test_duplicate_name_in_session_conflicts() {
        let repo = setup_repo().await;

        repo.create_parcel(new_parcel("s1", "Jacket", 1))
            .await
            .unwrap();
        let result = repo.create_parcel(new_parcel("s1", "Jacket", 1)).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));

        // Same name is fine in another session
        repo.create_parcel(new_parcel("s2", "Jacket", 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_by_id_is_scoped_to_session() {
        let repo = setup_repo().await;

        let id = repo
            .create_parcel(new_parcel("s1", "Laptop", 2))
            .await
            .unwrap();

        let own = repo
            .get_by_id_and_session(id, &SessionId::new("s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.type_name, "electronics");
        assert_eq!(own.parcel.name, "Laptop");

        let foreign = repo
            .get_by_id_and_session(id, &SessionId::new("s2"))
            .await
            .unwrap();
        assert!(foreign.is_none());
    }

    #[tokio::test]
    async fn test_list_by_filters() {
        let repo = setup_repo().await;
        let session = SessionId::new("s1");

        let a = repo.create_parcel(new_parcel("s1", "A", 1)).await.unwrap();
        let b = repo.create_parcel(new_parcel("s1", "B", 2)).await.unwrap();
        let c = repo.create_parcel(new_parcel("s1", "C", 2)).await.unwrap();
        repo.create_parcel(new_parcel("s2", "D", 2)).await.unwrap();

        let mut priced = repo.get_parcel(b).await.unwrap().unwrap();
        priced.apply_rate(Rate::new(90.0).unwrap(), chrono::Utc::now());
        repo.persist(&priced).await.unwrap();

        let all = repo
            .list_by_filters(&session, &ListParcelsQuery::default())
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|p| p.parcel.id).collect();
        assert_eq!(ids, vec![c, b, a]);

        let electronics = repo
            .list_by_filters(
                &session,
                &ListParcelsQuery {
                    type_id: Some(ParcelTypeId::new(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(electronics.len(), 2);

        let with_cost = repo
            .list_by_filters(
                &session,
                &ListParcelsQuery {
                    has_delivery_cost: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(with_cost.len(), 1);
        assert_eq!(with_cost[0].parcel.id, b);

        let without_cost = repo
            .list_by_filters(
                &session,
                &ListParcelsQuery {
                    has_delivery_cost: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(without_cost.len(), 2);

        let page = repo
            .list_by_filters(
                &session,
                &ListParcelsQuery {
                    limit: 1,
                    offset: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].parcel.id, b);
    }

    #[tokio::test]
    async fn test_persist_prices_parcel() {
        let repo = setup_repo().await;

        let id = repo.create_parcel(new_parcel("s1", "A", 1)).await.unwrap();
        repo.create_parcel(new_parcel("s1", "B", 1)).await.unwrap();
        assert_eq!(repo.get_unpriced_parcels().await.unwrap().len(), 2);

        let mut parcel = repo.get_parcel(id).await.unwrap().unwrap();
        let price = parcel.apply_rate(Rate::new(100.0).unwrap(), chrono::Utc::now());
        repo.persist(&parcel).await.unwrap();

        // (2.0 * 0.5 + 100.0 * 0.01) * 100.0
        assert_eq!(price, 200.0);
        let stored = repo.get_parcel(id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_price, Some(200.0));

        let unpriced = repo.get_unpriced_parcels().await.unwrap();
        assert_eq!(unpriced.len(), 1);
        assert_ne!(unpriced[0].id, id);
    }

    #[tokio::test]
    async fn test_persist_missing_parcel() {
        let repo = setup_repo().await;

        let id = repo.create_parcel(new_parcel("s1", "A", 1)).await.unwrap();
        let mut parcel = repo.get_parcel(id).await.unwrap().unwrap();
        parcel.id = ParcelId::new(4242);
        parcel.apply_rate(Rate::new(90.0).unwrap(), chrono::Utc::now());

        assert!(matches!(
            repo.persist(&parcel).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected_by_store() {
        let repo = setup_repo().await;

        let result = repo.create_parcel(new_parcel("s1", "A", 999)).await;

        assert!(matches!(result, Err(RepoError::Database(_))));
    }

    #[tokio::test]
    async fn test_bind_company_only_once() {
        let repo = setup_repo().await;

        let parcel = repo.create_parcel(new_parcel("s1", "A", 1)).await.unwrap();
        let dhl = repo
            .create_company(CreateCompanyRequest {
                name: "DHL".to_string(),
            })
            .await
            .unwrap();
        let ups = repo
            .create_company(CreateCompanyRequest {
                name: "UPS".to_string(),
            })
            .await
            .unwrap();

        assert!(repo.bind_company(parcel, dhl.id).await.unwrap());
        assert!(!repo.bind_company(parcel, ups.id).await.unwrap());

        let stored = repo.get_parcel(parcel).await.unwrap().unwrap();
        assert_eq!(stored.company_id, Some(dhl.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_binds_have_one_winner() {
        // A file database so the two binds run on separate pooled connections
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("bind.db").display());
        let repo = Arc::new(SqliteRepo::new(&url).await.unwrap());

        let mut companies = Vec::new();
        for name in ["DHL", "UPS"] {
            let company = repo
                .create_company(CreateCompanyRequest {
                    name: name.to_string(),
                })
                .await
                .unwrap();
            companies.push(company.id);
        }

        for round in 0..20 {
            let parcel = repo
                .create_parcel(new_parcel("s1", &format!("parcel-{}", round), 1))
                .await
                .unwrap();
            let barrier = Arc::new(Barrier::new(companies.len()));

            let handles: Vec<_> = companies
                .iter()
                .map(|&company_id| {
                    let repo = repo.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        barrier.wait().await;
                        let bound = repo.bind_company(parcel, company_id).await.unwrap();
                        (company_id, bound)
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for handle in handles {
                let (company_id, bound) = handle.await.unwrap();
                if bound {
                    winners.push(company_id);
                }
            }

            assert_eq!(winners.len(), 1, "round {}: {:?}", round, winners);
            let stored = repo.get_parcel(parcel).await.unwrap().unwrap();
            assert_eq!(stored.company_id, Some(winners[0]));
        }
    }

    #[tokio::test]
    async fn test_bind_company_missing_parcel() {
        let repo = setup_repo().await;

        let company = repo
            .create_company(CreateCompanyRequest {
                name: "DHL".to_string(),
            })
            .await
            .unwrap();

        assert!(
            !repo
                .bind_company(ParcelId::new(77), company.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_companies() {
        let repo = setup_repo().await;

        let created = repo
            .create_company(CreateCompanyRequest {
                name: "  FedEx ".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.name, "FedEx");

        let all = repo.list_companies().await.unwrap();
        assert_eq!(all.len(), 1);

        let fetched = repo.get_company(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(
            repo.get_company(CompanyId::new(99))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_company_name_validation() {
        let repo = setup_repo().await;

        let result = repo
            .create_company(CreateCompanyRequest {
                name: "   ".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::ValidationError(_)))
        ));
    }
}
